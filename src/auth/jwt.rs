use crate::models::Claims;
use jsonwebtoken::{DecodingKey, Validation, decode};

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

/// Mints a token the way the identity provider does; tests only.
#[cfg(test)]
pub fn issue_test_token(secret: &str, role: u8, employee_id: Option<u64>) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let claims = Claims {
        user_id: 1,
        sub: "tester".to_string(),
        role,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        employee_id,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode test token")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_own_tokens() {
        let token = issue_test_token("s3cret", 2, Some(9));
        let claims = verify_token(&token, "s3cret").unwrap();
        assert_eq!(claims.role, 2);
        assert_eq!(claims.employee_id, Some(9));
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = issue_test_token("s3cret", 1, None);
        assert!(verify_token(&token, "other").is_err());
    }
}
