//! Standard response envelope: `{status, message, data}`.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Envelope {
            status: "success",
            message: message.into(),
            data: Some(data),
            meta: None,
            code: None,
        }
    }

    pub fn error(code: &'static str, message: String) -> Self {
        Envelope {
            status: "error",
            message,
            data: None,
            meta: None,
            code: Some(code),
        }
    }
}

pub fn success_one<T: Serialize>(message: impl Into<String>, data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, Json(Envelope::success(message, data)))
}

pub fn success_one_ok<T: Serialize>(message: impl Into<String>, data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::OK, Json(Envelope::success(message, data)))
}

pub fn success_many<T: Serialize>(message: impl Into<String>, data: Vec<T>) -> (StatusCode, Json<Envelope<Vec<T>>>) {
    let count = data.len() as u64;
    let mut env = Envelope::success(message, data);
    env.meta = Some(MetaCount { count });
    (StatusCode::OK, Json(env))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_envelope_carries_count() {
        let (status, Json(env)) = success_many("listed", vec![1, 2, 3]);
        assert_eq!(status, StatusCode::OK);
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["status"], "success");
        assert_eq!(v["meta"]["count"], 3);
        assert!(v.get("code").is_none());
    }

    #[test]
    fn error_envelope_has_null_data() {
        let v = serde_json::to_value(Envelope::<()>::error("conflict", "dup".into())).unwrap();
        assert_eq!(v["status"], "error");
        assert!(v["data"].is_null());
        assert_eq!(v["code"], "conflict");
    }
}
