use crate::error::ServiceError;
use axum::http::HeaderMap;
use uuid::Uuid;

/// Authentication is terminated upstream; the gateway forwards the acting
/// user's id in this header.
pub const USER_ID_HEADER: &str = "x-user-id";

pub fn actor_id(headers: &HeaderMap) -> Result<Uuid, ServiceError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or(ServiceError::NotAuthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_a_missing_or_malformed_header() {
        let empty = HeaderMap::new();
        assert!(actor_id(&empty).is_err());

        let mut bad = HeaderMap::new();
        bad.insert(USER_ID_HEADER, "not-a-uuid".parse().unwrap());
        assert!(actor_id(&bad).is_err());
    }

    #[test]
    fn accepts_a_valid_uuid() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, id.to_string().parse().unwrap());
        assert_eq!(actor_id(&headers).unwrap(), id);
    }
}
