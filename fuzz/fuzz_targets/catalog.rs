#![no_main]

use apiscope::catalog::ApiCatalog;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(catalog) = ApiCatalog::from_bytes(data) else {
        return;
    };
    for api in catalog.apis() {
        let _ = api.full_name();
        if let Ok(declarations) = api.declarations() {
            for declaration in declarations {
                let _ = declaration.text();
                let _ = declaration.platform_support();
            }
        }
    }
});
