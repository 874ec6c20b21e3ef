use medialib::{Collection, ErrorKind, Medialib, MedialibConfig, Result, Value};
use serde_json::json;

const ID3: &str = "plugin/id3v2";

fn library() -> Result<(Medialib, Vec<i32>)> {
    let lib = Medialib::open(MedialibConfig {
        random_seed: Some(11),
        ..MedialibConfig::default()
    })?;
    let mut ids = Vec::new();
    let mut session = lib.begin_write();
    for (n, artist, title) in [
        (1, "Red Fang", "Prehistoric Dog"),
        (2, "Red Fang", "Reverse Thunder"),
        (3, "Red Fang", "Wires"),
        (4, "Red Fang", "Hank Is Dead"),
    ] {
        let id = session.entry_new(&format!("file:///music/red-fang/{n}.flac"))?;
        session.property_set_int(id, "tracknr", n, ID3)?;
        session.property_set_str(id, "artist", artist, ID3)?;
        session.property_set_str(id, "title", title, ID3)?;
        ids.push(id);
    }
    session.commit()?;
    Ok((lib, ids))
}

fn ints(values: &[i32]) -> Value {
    Value::List(values.iter().copied().map(Value::Int).collect())
}

#[test]
fn sum_then_remove_then_requery() -> Result<()> {
    let (lib, ids) = library()?;
    let fetch = json!({"type": "metadata", "get": ["value"], "fields": ["tracknr"], "aggregate": "sum"});
    assert_eq!(lib.query(&Collection::universe(), &fetch)?, Some(Value::Int(10)));

    let mut session = lib.begin_write();
    session.entry_remove(ids[0])?;
    session.commit()?;

    assert_eq!(lib.query(&Collection::universe(), &fetch)?, Some(Value::Int(9)));
    Ok(())
}

#[test]
fn invalid_fetch_spec_skips_the_store() -> Result<()> {
    let (lib, _) = library()?;
    let before = lib.store().evaluation_count();
    let err = lib
        .query(
            &Collection::universe(),
            &json!({"type": "metadata", "get": ["bogus"]}),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("bogus"));
    assert_eq!(lib.store().evaluation_count(), before);
    Ok(())
}

#[test]
fn ids_follow_collection_order() -> Result<()> {
    let (lib, ids) = library()?;
    let fetch = json!({"type": "metadata", "get": ["id"], "aggregate": "list"});

    let ascending = Collection::universe().order_by_id();
    assert_eq!(lib.query(&ascending, &fetch)?, Some(ints(&ids)));

    let mut reversed = ids.clone();
    reversed.reverse();
    let descending = Collection::universe().order_by_id().descending();
    assert_eq!(lib.query(&descending, &fetch)?, Some(ints(&reversed)));

    let by_track = Collection::universe().order_by("tracknr").descending();
    let per_entry = json!({
        "type": "cluster-list", "cluster-by": "id",
        "data": {"type": "metadata", "get": ["value"], "fields": ["tracknr"]}
    });
    assert_eq!(lib.query(&by_track, &per_entry)?, Some(ints(&[4, 3, 2, 1])));
    Ok(())
}

#[test]
fn count_matches_id_list_length() -> Result<()> {
    let (lib, _) = library()?;
    let subset = Collection::universe().order_by_id().limit(1, Some(2));
    let count = lib.query(&subset, &json!({"type": "count"}))?;
    let listed = lib.query(&subset, &json!({"get": ["id"], "aggregate": "list"}))?;
    assert_eq!(count, Some(Value::Int(2)));
    assert_eq!(listed.as_ref().and_then(Value::as_list).map(<[Value]>::len), Some(2));
    Ok(())
}

#[test]
fn bare_entries_list_each_id_once() -> Result<()> {
    let lib = Medialib::open(MedialibConfig::default())?;
    let mut session = lib.begin_write();
    let ids = (0..4)
        .map(|n| session.entry_new(&format!("file:///bare/{n}.ogg")))
        .collect::<Result<Vec<_>>>()?;
    session.commit()?;

    let ordered = Collection::universe().order_by_id();
    let count = lib.query(&ordered, &json!({"type": "count"}))?;
    let listed = lib.query(&ordered, &json!({"type": "metadata", "get": ["id"], "aggregate": "list"}))?;
    assert_eq!(count, Some(Value::Int(4)));
    assert_eq!(listed, Some(ints(&ids)));
    Ok(())
}

#[test]
fn organize_keeps_declared_keys() -> Result<()> {
    let (lib, _) = library()?;
    let fetch = json!({
        "type": "organize",
        "data": {
            "tracks": {"type": "count"},
            "artists": {"get": ["value"], "fields": ["artist"], "aggregate": "set"},
            "missing": {"get": ["value"], "fields": ["genre"]}
        }
    });
    let result = lib.query(&Collection::universe(), &fetch)?.unwrap();
    let dict = result.as_dict().unwrap();
    assert_eq!(dict.keys().collect::<Vec<_>>(), vec!["tracks", "artists"]);
    assert_eq!(dict.get("tracks"), Some(&Value::Int(4)));
    assert_eq!(
        dict.get("artists"),
        Some(&Value::List(vec![Value::from("Red Fang")]))
    );
    Ok(())
}

#[test]
fn organize_output_follows_declaration_order() -> Result<()> {
    let (lib, _) = library()?;
    let fetch = json!({
        "type": "organize",
        "data": {"zeta": {"type": "count"}, "alpha": {"type": "count"}, "mid": {"type": "count"}}
    });
    let result = lib.query(&Collection::universe(), &fetch)?.unwrap();
    assert_eq!(
        result.as_dict().unwrap().keys().collect::<Vec<_>>(),
        vec!["zeta", "alpha", "mid"]
    );
    assert_eq!(result.to_string(), r#"{"zeta":4,"alpha":4,"mid":4}"#);
    Ok(())
}

#[test]
fn cluster_dict_by_artist() -> Result<()> {
    let (lib, _) = library()?;
    let mut session = lib.begin_write();
    let id = session.entry_new("file:///music/vreid/1.flac")?;
    session.property_set_str(id, "artist", "Vreid", ID3)?;
    session.property_set_int(id, "tracknr", 7, ID3)?;
    let lone = session.entry_new("file:///music/unknown.flac")?;
    session.commit()?;

    let fetch = json!({
        "type": "cluster-dict", "cluster-field": "artist",
        "data": {"get": ["value"], "fields": ["tracknr"], "aggregate": "max"}
    });
    let result = lib.query(&Collection::universe(), &fetch)?.unwrap();
    let dict = result.as_dict().unwrap();
    assert_eq!(dict.len(), 2);
    assert_eq!(dict.get("Red Fang"), Some(&Value::Int(4)));
    assert_eq!(dict.get("Vreid"), Some(&Value::Int(7)));

    let with_fallback = json!({
        "type": "cluster-dict", "cluster-field": "artist", "cluster-fallback": "Unknown",
        "data": {"get": ["id"]}
    });
    let result = lib.query(&Collection::universe(), &with_fallback)?.unwrap();
    assert_eq!(result.as_dict().unwrap().get("Unknown"), Some(&Value::Int(lone)));
    Ok(())
}

#[test]
fn cluster_dict_with_no_rows_is_null() -> Result<()> {
    let (lib, _) = library()?;
    let nobody = Collection::equals("artist", "Nobody");
    let fetch = json!({"type": "cluster-dict", "cluster-field": "artist", "data": {"type": "count"}});
    assert_eq!(lib.query(&nobody, &fetch)?, None);
    let list = json!({"type": "cluster-list", "cluster-field": "artist", "data": {"type": "count"}});
    assert_eq!(lib.query(&nobody, &list)?, Some(Value::List(Vec::new())));
    Ok(())
}

#[test]
fn source_preference_picks_the_winner() -> Result<()> {
    let (lib, ids) = library()?;
    let mut session = lib.begin_write();
    session.property_set_str(ids[0], "title", "Prehistoric Dog (Live)", "server")?;
    session.commit()?;

    let only = Collection::ids([ids[0]]);
    let default = json!({"get": ["value"], "fields": ["title"]});
    assert_eq!(
        lib.query(&only, &default)?,
        Some(Value::from("Prehistoric Dog (Live)"))
    );
    let plugin_first = json!({
        "get": ["value"], "fields": ["title"], "source-preference": ["plugin/*", "server"]
    });
    assert_eq!(lib.query(&only, &plugin_first)?, Some(Value::from("Prehistoric Dog")));

    let by_source = json!({"get": ["source", "value"], "fields": ["title"]});
    let result = lib.query(&only, &by_source)?.unwrap();
    assert_eq!(
        result.as_dict().unwrap().get("server"),
        Some(&Value::from("Prehistoric Dog (Live)"))
    );
    Ok(())
}

#[test]
fn nested_get_builds_per_entry_dicts() -> Result<()> {
    let (lib, ids) = library()?;
    let fetch = json!({"get": ["id", "field", "value"], "fields": ["artist", "tracknr"]});
    let result = lib.query(&Collection::universe(), &fetch)?.unwrap();
    let dict = result.as_dict().unwrap();
    assert_eq!(dict.len(), ids.len());
    let first = dict.get(&ids[2].to_string()).and_then(Value::as_dict).unwrap();
    assert_eq!(first.get("artist"), Some(&Value::from("Red Fang")));
    assert_eq!(first.get("tracknr"), Some(&Value::Int(3)));
    Ok(())
}

#[test]
fn collection_errors_propagate() -> Result<()> {
    let (lib, _) = library()?;
    let bad = Collection::universe().order_by("");
    let err = lib.query(&bad, &json!({"type": "count"})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    Ok(())
}
