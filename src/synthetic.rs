//! Synthetic batch generation for local end-to-end runs.
//!
//! Builds well-formed queue records shaped like the bulk test traffic the
//! upstream queue carries, so the archiver can be exercised without a
//! live queue source.

use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

use crate::event::{QueueEvent, QueueRecord};

/// Generate a batch of `count` synthetic queue records.
pub fn generate_batch(count: usize) -> QueueEvent {
    let batch_id = Utc::now().format("%Y%m%d_%H%M%S").to_string();
    QueueEvent {
        records: (1..=count)
            .map(|sequence| generate_record(sequence, &batch_id))
            .collect(),
    }
}

fn generate_record(sequence: usize, batch_id: &str) -> QueueRecord {
    let priority = match sequence {
        1..=3 => "high",
        4..=7 => "medium",
        _ => "low",
    };

    let body = json!({
        "test_id": format!("BULK-{sequence:03}"),
        "message": format!("Bulk test message #{sequence}"),
        "timestamp": Utc::now().to_rfc3339(),
        "uuid": Uuid::new_v4().to_string(),
        "data": {
            "iteration": sequence,
            "type": "bulk-test",
            "priority": priority,
            "metadata": {
                "source": "bulk-sender",
                "version": "1.0",
                "sequence": sequence,
            },
        },
    });

    let mut attributes = HashMap::new();
    attributes.insert(
        "Priority".to_string(),
        json!({"stringValue": priority, "dataType": "String"}),
    );
    attributes.insert(
        "BatchId".to_string(),
        json!({"stringValue": batch_id, "dataType": "String"}),
    );
    attributes.insert(
        "MessageType".to_string(),
        json!({"stringValue": "BulkTest", "dataType": "String"}),
    );

    QueueRecord {
        message_id: Some(Uuid::new_v4().to_string()),
        receipt_handle: Some(format!("synthetic-{}", Uuid::new_v4())),
        body: Some(body.to_string()),
        message_attributes: attributes,
    }
}
