//! Runs the shipped search specs in a real browser against the live blog.
//!
//! Needs Node.js with Playwright installed. Ignored by default:
//! `cargo test -p qa-e2e --test live -- --ignored`

use std::path::Path;

use qa_common::{Runner, RunnerConfig, SpecFile};
use qa_e2e::{build_cases, check_playwright_installed, CaptureMode, WebConfig, WebStep};

#[tokio::test]
#[ignore]
async fn shipped_specs_pass_against_the_blog() {
    check_playwright_installed().expect("playwright should be installed");

    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("specs");
    let specs: Vec<SpecFile<WebStep>> = SpecFile::load_all(&dir).unwrap();

    let output = tempfile::tempdir().unwrap();
    let runner = Runner::new(
        RunnerConfig {
            retries: Some(1),
            workers: Some(1),
            output_dir: output.path().to_path_buf(),
            ..Default::default()
        }
        .resolve(false, 2)
        .unwrap(),
    );
    let config = WebConfig {
        trace: CaptureMode::RetainOnFailure,
        video: CaptureMode::Off,
        ..Default::default()
    };

    let report = runner.run(build_cases(specs, &config)).await.unwrap();
    let failed: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.status.is_failure())
        .map(|r| format!("{}: {:?}", r.title, r.error))
        .collect();
    assert!(failed.is_empty(), "failed: {:#?}", failed);
}
