use actix_web::{web, HttpResponse};
use std::collections::HashMap;
use url::form_urlencoded;

pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Parses URL-encoded form data from bytes, handling potential UTF-8 errors gracefully.
pub fn parse_form(form_bytes: &web::Bytes) -> Result<HashMap<String, String>, HttpResponse> {
    let body = std::str::from_utf8(form_bytes)
        .map_err(|_| HttpResponse::BadRequest().body("Invalid UTF-8 in request body."))?;
    Ok(form_urlencoded::parse(body.as_bytes()).into_owned().collect())
}

/// Missing fields read as empty so they fail the credential check instead of the parser.
pub fn parse_login_form(form_bytes: &web::Bytes) -> Result<LoginForm, HttpResponse> {
    let mut parsed = parse_form(form_bytes)?;
    Ok(LoginForm {
        username: parsed.remove("username").unwrap_or_default(),
        password: parsed.remove("password").unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_fields_are_decoded() {
        let Ok(form) = parse_login_form(&web::Bytes::from_static(b"username=admin&password=boda%202026")) else {
            panic!("form should parse");
        };
        assert_eq!(form.username, "admin");
        assert_eq!(form.password, "boda 2026");
    }

    #[test]
    fn missing_fields_are_empty() {
        let Ok(form) = parse_login_form(&web::Bytes::from_static(b"username=admin")) else {
            panic!("form should parse");
        };
        assert!(form.password.is_empty());
    }

    #[test]
    fn invalid_utf8_is_a_bad_request() {
        let result = parse_form(&web::Bytes::from_static(&[0xff, 0xfe]));
        assert!(result.is_err());
    }
}
