#![no_main]

use apiscope::{metadata::model::MetadataFile, usage::Crawler};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(file) = MetadataFile::from_mem(data.to_vec()) {
        let _ = Crawler::crawl(&file);
    }
});
