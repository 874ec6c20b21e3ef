#![allow(missing_docs)]

use medialib::{query_profile_snapshot, Collection, Medialib, MedialibConfig, Result};
use serde_json::json;

// Profiling is latched on first use, so this binary holds a single test.
#[test]
fn profile_counters_track_phases_and_reset() -> Result<()> {
    std::env::set_var("MEDIALIB_PROFILE", "1");
    let lib = Medialib::open(MedialibConfig::default())?;
    let mut session = lib.begin_write();
    session.entry_new("file:///profiled.ogg")?;
    session.commit()?;

    let _ = query_profile_snapshot(true);
    for _ in 0..3 {
        lib.query(&Collection::universe(), &json!({"type": "count"}))?;
    }
    let snapshot = query_profile_snapshot(true).expect("profiling enabled");
    assert_eq!(snapshot.compile_count, 3);
    assert_eq!(snapshot.execute_count, 3);
    assert_eq!(snapshot.materialize_count, 3);

    let cleared = query_profile_snapshot(false).expect("profiling enabled");
    assert_eq!(cleared.compile_count, 0);
    assert_eq!(cleared.execute_count, 0);
    assert_eq!(cleared.materialize_count, 0);
    assert_eq!(cleared.execute_ns, 0);

    let _ = lib.query(&Collection::universe(), &json!({"get": ["bogus"]}));
    let after_error = query_profile_snapshot(false).expect("profiling enabled");
    assert_eq!(after_error.execute_count, 0);
    Ok(())
}
