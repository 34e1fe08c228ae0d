//! Declarative API steps and their executor

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use qa_common::{ensure, QaError, QaResult, SpecFile, TestCase};

use crate::client::{ApiConfig, ApiResponse, DogApiClient};
use crate::envelope::{Envelope, ImageUrl};
use crate::validators::{
    expect_breed_map, expect_content_type, expect_error_response, expect_image_content,
    expect_image_list, expect_random_images, expect_single_image, expect_success_response,
    expect_urls_contain, image_urls,
};

/// A single step in an API test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ApiStep {
    /// Issue a GET; later expectations inspect this response
    Get { path: String },

    /// Status code only
    ExpectStatus { code: u16 },

    /// Status 200 and a `success` envelope
    ExpectSuccess,

    /// Error envelope with the given status code
    ExpectError {
        #[serde(default = "default_error_status")]
        status: u16,
        #[serde(default)]
        message_contains: Option<String>,
    },

    ExpectContentType { contains: String },

    /// `message` is a non-empty breed map
    ExpectBreedMap,

    /// Every listed breed is a key of the breed map
    ExpectBreeds { present: Vec<String> },

    /// A breed's sub-breed list is empty, or non-empty with non-empty names
    ExpectSubBreeds { breed: String, empty: bool },

    /// `message` is a list of image URLs
    ExpectImageList {
        /// Exact length; without it the list only has to be non-empty
        #[serde(default)]
        count: Option<usize>,
        #[serde(default)]
        url_contains: Vec<String>,
    },

    /// `message` is one image URL
    ExpectSingleImage,

    /// The first `limit` image URLs of the response answer as images
    ExpectImagesReachable {
        #[serde(default = "default_reachable_limit")]
        limit: usize,
    },

    /// Repeated calls to `path` return at least `min_distinct` different values
    ExpectVariety {
        path: String,
        calls: usize,
        min_distinct: usize,
        #[serde(default)]
        by: VarietyKey,
    },
}

fn default_error_status() -> u16 {
    404
}

fn default_reachable_limit() -> usize {
    3 // keeps the test fast
}

/// What a variety check compares
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarietyKey {
    #[default]
    Url,
    /// The `breeds/{segment}` part of the URL
    Breed,
}

impl ApiStep {
    fn name(&self) -> String {
        match self {
            ApiStep::Get { path } => format!("get:{}", path),
            ApiStep::ExpectStatus { code } => format!("expect_status:{}", code),
            ApiStep::ExpectSuccess => "expect_success".to_string(),
            ApiStep::ExpectError { status, .. } => format!("expect_error:{}", status),
            ApiStep::ExpectContentType { contains } => format!("expect_content_type:{}", contains),
            ApiStep::ExpectBreedMap => "expect_breed_map".to_string(),
            ApiStep::ExpectBreeds { present } => format!("expect_breeds:{}", present.join(",")),
            ApiStep::ExpectSubBreeds { breed, .. } => format!("expect_sub_breeds:{}", breed),
            ApiStep::ExpectImageList { .. } => "expect_image_list".to_string(),
            ApiStep::ExpectSingleImage => "expect_single_image".to_string(),
            ApiStep::ExpectImagesReachable { limit } => format!("expect_images_reachable:{}", limit),
            ApiStep::ExpectVariety { path, .. } => format!("expect_variety:{}", path),
        }
    }
}

/// Executes steps against one client, remembering the last response
pub struct ApiScenario<'a> {
    client: &'a DogApiClient,
    last: Option<ApiResponse>,
}

impl<'a> ApiScenario<'a> {
    pub fn new(client: &'a DogApiClient) -> Self {
        Self { client, last: None }
    }

    pub fn last_response(&self) -> QaResult<&ApiResponse> {
        self.last
            .as_ref()
            .ok_or_else(|| QaError::SpecParse("expectation before any `get` step".into()))
    }

    /// Envelope `message` of the last response, without a status-code check
    fn message(&self) -> QaResult<Value> {
        Ok(Envelope::from_value(self.last_response()?.json()?)?.message)
    }

    pub async fn run(&mut self, steps: &[ApiStep]) -> QaResult<()> {
        for step in steps {
            self.run_step(step).await?;
        }
        Ok(())
    }

    pub async fn run_step(&mut self, step: &ApiStep) -> QaResult<()> {
        debug!("Executing step: {}", step.name());

        match step {
            ApiStep::Get { path } => {
                self.last = Some(self.client.get(path).await?);
            }
            ApiStep::ExpectStatus { code } => {
                let status = self.last_response()?.status;
                ensure(status == *code, "status code", code.to_string(), status)?;
            }
            ApiStep::ExpectSuccess => {
                expect_success_response(self.last_response()?)?;
            }
            ApiStep::ExpectError {
                status,
                message_contains,
            } => {
                expect_error_response(self.last_response()?, *status, message_contains.as_deref())?;
            }
            ApiStep::ExpectContentType { contains } => {
                expect_content_type(self.last_response()?, contains)?;
            }
            ApiStep::ExpectBreedMap => {
                expect_breed_map(&self.message()?)?;
            }
            ApiStep::ExpectBreeds { present } => {
                let breeds = expect_breed_map(&self.message()?)?;
                for breed in present {
                    ensure(
                        breeds.contains(breed),
                        format!("message.{}", breed),
                        "present",
                        "missing",
                    )?;
                }
            }
            ApiStep::ExpectSubBreeds { breed, empty } => {
                let breeds = expect_breed_map(&self.message()?)?;
                let field = format!("message.{}", breed);
                let subs = breeds
                    .sub_breeds(breed)
                    .ok_or_else(|| QaError::assertion(&field, "present", "missing"))?;
                if *empty {
                    ensure(subs.is_empty(), &field, "[]", format!("{:?}", subs))?;
                } else {
                    ensure(!subs.is_empty(), &field, "non-empty list", "[]")?;
                    for (i, sub) in subs.iter().enumerate() {
                        ensure(
                            !sub.is_empty(),
                            format!("{}[{}]", field, i),
                            "non-empty string",
                            "\"\"",
                        )?;
                    }
                }
            }
            ApiStep::ExpectImageList {
                count,
                url_contains,
            } => {
                let message = self.message()?;
                let urls = match count {
                    Some(n) => expect_random_images(&message, *n)?,
                    None => expect_image_list(&message)?,
                };
                expect_urls_contain(&urls, url_contains)?;
            }
            ApiStep::ExpectSingleImage => {
                expect_single_image(&self.message()?)?;
            }
            ApiStep::ExpectImagesReachable { limit } => {
                let urls: Vec<ImageUrl> = match self.message()? {
                    Value::String(url) => vec![ImageUrl::parse(&url)?],
                    list @ Value::Array(_) => {
                        image_urls(&list)?.into_iter().take(*limit).collect()
                    }
                    other => {
                        return Err(QaError::assertion(
                            "message",
                            "image url or list",
                            crate::envelope::kind_of(&other),
                        ))
                    }
                };
                ensure(!urls.is_empty(), "message", "at least one image url", "none")?;
                for url in urls {
                    let response = self.client.get(url.as_str()).await?;
                    expect_image_content(&response)?;
                }
            }
            ApiStep::ExpectVariety {
                path,
                calls,
                min_distinct,
                by,
            } => {
                let mut seen = BTreeSet::new();
                for _ in 0..*calls {
                    let response = self.client.get(path).await?;
                    let message = Envelope::from_value(response.json()?)?.message;
                    let url = expect_single_image(&message)?;
                    if let Some(key) = variety_key(&url, *by) {
                        seen.insert(key);
                    }
                }
                ensure(
                    seen.len() >= *min_distinct,
                    format!("distinct {:?} values over {} calls", by, calls),
                    format!("at least {}", min_distinct),
                    seen.len(),
                )?;
            }
        }
        Ok(())
    }
}

fn variety_key(url: &ImageUrl, by: VarietyKey) -> Option<String> {
    match by {
        VarietyKey::Url => Some(url.as_str().to_string()),
        VarietyKey::Breed => url.breed_segment().map(str::to_string),
    }
}

/// One test case per spec test; each attempt builds its own client
pub fn build_cases(specs: Vec<SpecFile<ApiStep>>, config: &ApiConfig) -> Vec<TestCase> {
    let config = Arc::new(config.clone());
    let mut cases = Vec::new();

    for spec in specs {
        for case in spec.tests {
            let steps = Arc::new(case.steps);
            let config = config.clone();
            let mut tags = spec.tags.clone();
            tags.extend(case.tags);

            cases.push(
                TestCase::new(spec.describe.clone(), case.name, move |_info| {
                    let steps = steps.clone();
                    let config = config.clone();
                    async move {
                        let client = DogApiClient::new(&config)?;
                        ApiScenario::new(&client).run(&steps).await
                    }
                })
                .with_tags(tags)
                .with_only(case.only)
                .with_skip(case.skip),
            );
        }
    }
    cases
}
