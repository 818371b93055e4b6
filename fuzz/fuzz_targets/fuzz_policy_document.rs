#![no_main]

// Policy document fuzzer
//
// Feeds arbitrary bytes to both document parsers. Whatever parses and passes
// admission must then answer decisions deterministically without panicking.

use libfuzzer_sys::fuzz_target;
use meshgate_rbac::{Caller, DecisionEngine, PolicyDocument, RequestContext};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    for parsed in [
        PolicyDocument::from_toml_str(input),
        PolicyDocument::from_json_str(input),
    ] {
        let Ok(document) = parsed else {
            continue;
        };
        let Ok(snapshot) = document.into_snapshot("default", 1) else {
            continue;
        };

        let engine = DecisionEngine::new().without_audit();
        let req = RequestContext::new("svc", "default")
            .with_path("/")
            .with_method("GET")
            .with_caller(Caller::new().with_user("fuzzer"));

        let first = engine.decide(&snapshot, &req);
        let second = engine.decide(&snapshot, &req);
        assert_eq!(first, second, "decisions must be deterministic");
    }
});
