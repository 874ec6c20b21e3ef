#![no_main]

use libfuzzer_sys::fuzz_target;
use medialib::{compile, Collection, FetchInfo, Medialib, MedialibConfig};
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(fetch) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    let config = MedialibConfig {
        random_seed: Some(0),
        ..MedialibConfig::default()
    };
    let Ok(pref) = config.source_preference() else {
        return;
    };

    let mut info = FetchInfo::new(&pref);
    let compiled = compile(&fetch, &mut info, &pref);

    let Ok(lib) = Medialib::open(config) else {
        return;
    };
    let mut session = lib.begin_write();
    for (n, artist) in ["Red Fang", "Vreid"].iter().enumerate() {
        let Ok(id) = session.entry_new(&format!("file:///{n}.ogg")) else {
            return;
        };
        let _ = session.property_set_str(id, "artist", artist, "plugin/id3v2");
        let _ = session.property_set_int(id, "tracknr", n as i32 + 1, "plugin/id3v2");
    }
    let _ = session.commit();

    let before = lib.store().evaluation_count();
    let result = lib.query(&Collection::universe(), &fetch);
    if compiled.is_err() {
        assert!(result.is_err());
        assert_eq!(lib.store().evaluation_count(), before);
    }
});
