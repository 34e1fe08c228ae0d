use std::path::Path;

use qa_common::SpecFile;
use qa_e2e::{build_cases, Browser, WebConfig, WebStep};

#[test]
fn shipped_specs_parse() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("specs");
    let specs: Vec<SpecFile<WebStep>> = SpecFile::load_all(&dir).unwrap();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].tests.len(), 3);
    assert!(specs[0].tests.iter().all(|t| !t.only && !t.skip));

    let config = WebConfig {
        browsers: vec![Browser::Chromium, Browser::Webkit],
        ..Default::default()
    };
    let cases = build_cases(specs, &config);
    assert_eq!(cases.len(), 6);
    assert!(cases.iter().all(|c| c.project.is_some()));
}
