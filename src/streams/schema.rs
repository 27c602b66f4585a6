//! JSON schemas of the stream records
//!
//! Every property is nullable: the API omits or nulls fields freely and a
//! schema mismatch downstream is worse than a null.

use serde_json::{Map, Value, json};

fn nullable(kind: &str) -> Value {
    json!({"type": [kind, "null"]})
}

fn integer() -> Value {
    nullable("integer")
}

fn string() -> Value {
    nullable("string")
}

fn boolean() -> Value {
    nullable("boolean")
}

fn datetime() -> Value {
    json!({"type": ["string", "null"], "format": "date-time"})
}

fn object(properties: Vec<(&str, Value)>) -> Value {
    let properties: Map<String, Value> = properties
        .into_iter()
        .map(|(name, schema)| (name.to_string(), schema))
        .collect();
    json!({"type": ["object", "null"], "properties": properties})
}

fn array(items: Value) -> Value {
    json!({"type": ["array", "null"], "items": items})
}

/// Top-level record schema.
fn record(properties: Vec<(&str, Value)>) -> Value {
    let mut schema = object(properties);
    schema["type"] = json!("object");
    schema
}

fn customer() -> Value {
    object(vec![
        ("id", integer()),
        ("email", string()),
        ("name", string()),
        ("firstname", string()),
        ("lastname", string()),
    ])
}

fn address() -> Value {
    object(vec![("name", string()), ("address", string())])
}

pub fn tickets() -> Value {
    let emoji = object(vec![
        ("id", string()),
        ("name", string()),
        ("skin", integer()),
        ("colons", string()),
        ("native", string()),
        ("unified", string()),
    ]);
    record(vec![
        ("id", integer()),
        ("uri", string()),
        ("external_id", string()),
        ("language", string()),
        ("status", string()),
        ("priority", string()),
        ("channel", string()),
        ("via", string()),
        ("from_agent", boolean()),
        ("requester", customer()),
        ("customer", customer()),
        ("assignee_user", customer()),
        (
            "assignee_team",
            object(vec![
                ("id", integer()),
                ("name", string()),
                ("decoration", object(vec![("emoji", emoji)])),
            ]),
        ),
        ("subject", string()),
        ("excerpt", string()),
        (
            "integrations",
            array(object(vec![
                ("name", string()),
                ("address", string()),
                ("type", string()),
            ])),
        ),
        (
            "tags",
            array(object(vec![
                ("id", integer()),
                ("name", string()),
                ("uri", string()),
            ])),
        ),
        ("messages_count", integer()),
        ("is_unread", boolean()),
        ("created_datetime", datetime()),
        ("opened_datetime", datetime()),
        ("last_received_message_datetime", datetime()),
        ("last_message_datetime", datetime()),
        ("updated_datetime", datetime()),
        ("closed_datetime", datetime()),
        ("snooze_datetime", datetime()),
    ])
}

pub fn messages() -> Value {
    record(vec![
        ("id", integer()),
        ("uri", string()),
        ("message_id", string()),
        ("ticket_id", integer()),
        ("external_id", string()),
        ("public", boolean()),
        ("channel", string()),
        ("via", string()),
        (
            "source",
            object(vec![
                ("type", string()),
                ("to", array(address())),
                ("from", address()),
            ]),
        ),
        ("sender", customer()),
        ("integration_id", integer()),
        ("rule_id", integer()),
        ("from_agent", boolean()),
        ("receiver", customer()),
        ("subject", string()),
        ("body_text", string()),
        ("body_html", string()),
        ("stripped_text", string()),
        ("stripped_html", string()),
        ("stripped_signature", string()),
        ("created_datetime", datetime()),
        ("sent_datetime", datetime()),
        ("failed_datetime", datetime()),
        ("deleted_datetime", datetime()),
        ("opened_datetime", datetime()),
    ])
}

pub fn satisfaction_surveys() -> Value {
    record(vec![
        ("id", integer()),
        ("body_text", string()),
        ("created_datetime", datetime()),
        ("customer_id", integer()),
        ("score", integer()),
        ("scored_datetime", datetime()),
        ("sent_datetime", datetime()),
        ("should_send_datetime", datetime()),
        ("ticket_id", integer()),
        ("uri", string()),
    ])
}
