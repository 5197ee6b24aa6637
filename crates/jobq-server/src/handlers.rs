//! Demo job handlers wired into the `worker` binary by default: sending
//! email, generating a report, processing an image. Each simulates the work
//! with a short sleep and returns a mock result; swapping in the real
//! integration means replacing the body of `execute`, not the registration.

use jobq_core::{async_trait, JobHandler};
use serde_json::{json, Value};
use std::time::Duration;

pub struct EmailHandler;

#[async_trait]
impl JobHandler for EmailHandler {
    fn job_type(&self) -> &str {
        "emails"
    }

    async fn execute(&self, payload: &Value) -> anyhow::Result<Value> {
        let to = payload.get("to").and_then(Value::as_str).unwrap_or("unknown@example.com");
        let subject = payload.get("subject").and_then(Value::as_str).unwrap_or("No subject");

        tokio::time::sleep(Duration::from_millis(200)).await;

        Ok(json!({
            "status": "sent",
            "to": to,
            "subject": subject,
        }))
    }
}

pub struct ReportGenerationHandler;

#[async_trait]
impl JobHandler for ReportGenerationHandler {
    fn job_type(&self) -> &str {
        "report_generation"
    }

    async fn execute(&self, payload: &Value) -> anyhow::Result<Value> {
        let report_type = payload.get("report_type").and_then(Value::as_str).unwrap_or("unknown");
        let report_id = payload.get("report_id").cloned().unwrap_or(Value::Null);

        tokio::time::sleep(Duration::from_millis(200)).await;

        Ok(json!({
            "status": "generated",
            "report_type": report_type,
            "report_id": report_id,
            "file_path": format!("/tmp/report_{report_id}.pdf"),
        }))
    }
}

pub struct ImageProcessingHandler;

#[async_trait]
impl JobHandler for ImageProcessingHandler {
    fn job_type(&self) -> &str {
        "images_processing"
    }

    async fn execute(&self, payload: &Value) -> anyhow::Result<Value> {
        let image_id = payload.get("image_id").cloned().unwrap_or(Value::Null);
        let operations = payload.get("operations").cloned().unwrap_or_else(|| json!([]));

        tokio::time::sleep(Duration::from_millis(200)).await;

        Ok(json!({
            "status": "processed",
            "image_id": image_id,
            "operations": operations,
            "output_path": format!("/tmp/processed_{image_id}.jpg"),
        }))
    }
}
