#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

const PRE_KEY: &[u8] = b"fuzz target fixed pre-key material";

static READER: Lazy<obscurcore::PackageReader> = Lazy::new(|| obscurcore::PackageReader::with_symmetric_key(PRE_KEY.to_vec()));

fuzz_target!(|data: &[u8]| {
    let reader = &*READER;
    let mut cursor = Cursor::new(data.to_vec());
    let Ok(manifest) = reader.read_manifest(&mut cursor) else {
        return;
    };
    let _ = reader.extract_to(manifest, &mut cursor, |_item| Ok(Box::new(Vec::new()) as Box<dyn std::io::Write>));
});
