//! Response validators
//!
//! Each validator either returns the decoded value or an assertion failure
//! naming the field that broke the contract.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use qa_common::{ensure, QaError, QaResult};

use crate::client::ApiResponse;
use crate::envelope::{kind_of, ApiStatus, BreedMap, Envelope, ImageUrl};

static IMAGE_CONTENT_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"image/(jpeg|jpg|png|gif)").expect("valid content type pattern"));

/// Status 200 and a `success` envelope
pub fn expect_success_response(response: &ApiResponse) -> QaResult<Envelope> {
    ensure(response.status == 200, "status code", "200", response.status)?;
    let envelope = Envelope::from_value(response.json()?)?;
    ensure(
        envelope.status == ApiStatus::Success,
        "status",
        "\"success\"",
        "\"error\"",
    )?;
    Ok(envelope)
}

/// Given status code and an `error` envelope, optionally with a message substring
pub fn expect_error_response(
    response: &ApiResponse,
    expected_status: u16,
    message_contains: Option<&str>,
) -> QaResult<Envelope> {
    ensure(
        response.status == expected_status,
        "status code",
        expected_status.to_string(),
        response.status,
    )?;
    let envelope = Envelope::from_value(response.json()?)?;
    ensure(
        envelope.status == ApiStatus::Error,
        "status",
        "\"error\"",
        "\"success\"",
    )?;

    if let Some(needle) = message_contains {
        let text = match &envelope.message {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        ensure(
            text.contains(needle),
            "message",
            format!("to contain {:?}", needle),
            format!("{:?}", text),
        )?;
    }
    Ok(envelope)
}

/// Non-empty list where every element is an image URL
pub fn expect_image_list(message: &Value) -> QaResult<Vec<ImageUrl>> {
    let urls = image_urls(message)?;
    ensure(!urls.is_empty(), "message", "non-empty list", "[]")?;
    Ok(urls)
}

/// Exactly `expected` image URLs
pub fn expect_random_images(message: &Value, expected: usize) -> QaResult<Vec<ImageUrl>> {
    let urls = image_urls(message)?;
    ensure(
        urls.len() == expected,
        "message.length",
        expected.to_string(),
        urls.len(),
    )?;
    Ok(urls)
}

/// A single image URL string
pub fn expect_single_image(message: &Value) -> QaResult<ImageUrl> {
    match message {
        Value::String(url) => ImageUrl::parse(url),
        other => Err(QaError::assertion("message", "string", kind_of(other))),
    }
}

/// A non-empty breed map
pub fn expect_breed_map(message: &Value) -> QaResult<BreedMap> {
    let breeds = BreedMap::from_message(message)?;
    ensure(!breeds.is_empty(), "message", "at least one breed", "{}")?;
    Ok(breeds)
}

pub fn expect_content_type(response: &ApiResponse, contains: &str) -> QaResult<()> {
    let actual = response.content_type.as_deref().unwrap_or("");
    ensure(
        actual.contains(contains),
        "content-type",
        format!("to contain {:?}", contains),
        format!("{:?}", actual),
    )
}

/// Every URL contains every segment (breed, sub-breed)
pub fn expect_urls_contain(urls: &[ImageUrl], segments: &[String]) -> QaResult<()> {
    for url in urls {
        for segment in segments {
            ensure(
                url.as_str().contains(segment.as_str()),
                "image url",
                format!("to contain {:?}", segment),
                url,
            )?;
        }
    }
    Ok(())
}

/// An image fetch answered 200 with an image content type
pub fn expect_image_content(response: &ApiResponse) -> QaResult<()> {
    ensure(
        response.status == 200,
        format!("status code of {}", response.url),
        "200",
        response.status,
    )?;
    let content_type = response.content_type.as_deref().unwrap_or("");
    ensure(
        IMAGE_CONTENT_TYPE.is_match(content_type),
        format!("content-type of {}", response.url),
        IMAGE_CONTENT_TYPE.as_str(),
        format!("{:?}", content_type),
    )
}

/// Every element of a list must be an image URL string
pub(crate) fn image_urls(message: &Value) -> QaResult<Vec<ImageUrl>> {
    let Value::Array(items) = message else {
        return Err(QaError::assertion("message", "array", kind_of(message)));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(url) => ImageUrl::parse(url),
            other => Err(QaError::assertion(
                format!("message[{}]", i),
                "string",
                kind_of(other),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: Value) -> ApiResponse {
        ApiResponse {
            url: "https://dog.ceo/api/test".into(),
            status,
            content_type: Some("application/json".into()),
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    #[test]
    fn test_success_response() {
        let env = expect_success_response(&response(
            200,
            json!({ "status": "success", "message": {} }),
        ))
        .unwrap();
        assert_eq!(env.status, ApiStatus::Success);
    }

    #[test]
    fn test_success_response_rejects_wrong_code_and_status() {
        let err = expect_success_response(&response(
            404,
            json!({ "status": "error", "message": "Breed not found" }),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("status code: expected 200, got 404"));

        let err = expect_success_response(&response(
            200,
            json!({ "status": "error", "message": "x" }),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("status: expected \"success\""));
    }

    #[test]
    fn test_error_response() {
        let resp = response(
            404,
            json!({ "status": "error", "message": "Breed not found (master breed does not exist)", "code": 404 }),
        );
        assert!(expect_error_response(&resp, 404, Some("Breed not found")).is_ok());
        assert!(expect_error_response(&resp, 404, None).is_ok());
        assert!(expect_error_response(&resp, 404, Some("Sub-breed")).is_err());
        assert!(expect_error_response(&resp, 500, None).is_err());
    }

    #[test]
    fn test_image_list() {
        let urls = expect_image_list(&json!([
            "https://images.dog.ceo/breeds/beagle/1.jpg",
            "https://images.dog.ceo/breeds/beagle/2.jpg"
        ]))
        .unwrap();
        assert_eq!(urls.len(), 2);

        assert!(expect_image_list(&json!([])).is_err());
        let err = expect_image_list(&json!(["https://x/1.jpg", 7])).unwrap_err();
        assert!(err.to_string().contains("message[1]"));
        assert!(expect_image_list(&json!("https://x/1.jpg")).is_err());
    }

    #[test]
    fn test_random_images_count() {
        let message = json!([
            "https://images.dog.ceo/breeds/a/1.jpg",
            "https://images.dog.ceo/breeds/b/2.png",
            "https://images.dog.ceo/breeds/c/3.gif"
        ]);
        assert_eq!(expect_random_images(&message, 3).unwrap().len(), 3);
        let err = expect_random_images(&message, 5).unwrap_err();
        assert!(err.to_string().contains("message.length: expected 5, got 3"));
    }

    #[test]
    fn test_single_image() {
        assert!(expect_single_image(&json!("https://images.dog.ceo/breeds/pug/1.jpg")).is_ok());
        assert!(expect_single_image(&json!(["https://images.dog.ceo/breeds/pug/1.jpg"])).is_err());
        assert!(expect_single_image(&json!("not a url")).is_err());
    }

    #[test]
    fn test_breed_map_must_not_be_empty() {
        assert!(expect_breed_map(&json!({ "pug": [] })).is_ok());
        assert!(expect_breed_map(&json!({})).is_err());
    }

    #[test]
    fn test_content_type() {
        let resp = response(200, json!({}));
        assert!(expect_content_type(&resp, "application/json").is_ok());
        assert!(expect_content_type(&resp, "text/html").is_err());
    }

    #[test]
    fn test_urls_contain_segments() {
        let urls = vec![
            ImageUrl::parse("https://images.dog.ceo/breeds/bulldog-french/1.jpg").unwrap(),
        ];
        assert!(expect_urls_contain(&urls, &["bulldog".into(), "french".into()]).is_ok());
        assert!(expect_urls_contain(&urls, &["boston".into()]).is_err());
    }

    #[test]
    fn test_image_content() {
        let mut resp = ApiResponse {
            url: "https://images.dog.ceo/breeds/pug/1.jpg".into(),
            status: 200,
            content_type: Some("image/jpeg".into()),
            body: vec![0xff, 0xd8],
        };
        assert!(expect_image_content(&resp).is_ok());

        resp.content_type = Some("text/html".into());
        assert!(expect_image_content(&resp).is_err());

        resp.content_type = Some("image/png".into());
        resp.status = 404;
        assert!(expect_image_content(&resp).is_err());
    }
}
