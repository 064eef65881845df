#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;
use trialkit::config::loader::ConfigLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml) = std::str::from_utf8(data) {
        let loader = ConfigLoader::with_defaults();
        // any outcome is fine as long as loading does not panic
        let _ = loader.load_str(yaml, Path::new("fuzz.yaml"));
    }
});
