use bb_utils::SecretString;
use serde::{Deserialize, Serialize};

/// Credentials exchanged for a token by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub token: SecretString,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_wire_names() {
        let resp: LoginResponse = serde_json::from_value(serde_json::json!({
            "userId": "101",
            "username": "alice",
            "email": "alice@example.com",
            "token": "eyJhbGciOi"
        }))
        .unwrap();
        assert_eq!(resp.token.expose(), "eyJhbGciOi");
        assert!(!format!("{resp:?}").contains("eyJhbGciOi"));

        let req = LoginRequest {
            email: "alice@example.com".into(),
            password: "pw".into(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({"email": "alice@example.com", "password": "pw"})
        );
    }
}
