//! Lowers a declarative fetch specification into a [`CompiledSpec`].
//!
//! Validation happens entirely here, before the store is touched. The first
//! problem found aborts compilation of the node and every ancestor; whatever
//! was built so far is dropped on the way out.

use rustc_hash::FxHashSet;
use serde_json::{Map, Value as Json};
use smallvec::SmallVec;
use tracing::trace;

use crate::error::{MedialibError, Result};
use crate::query::fetch_info::{FetchInfo, ID_COLUMN};
use crate::query::spec::{
    Aggregate, ClusterBy, ClusterSpec, CompiledSpec, GetField, MetadataSpec, OrganizeSpec,
};
use crate::storage::SourcePreference;

/// Compiles `fetch`, registering every needed column in `info`.
///
/// `pref` is the source preference inherited by nodes that do not set their
/// own `source-preference`.
pub fn compile(
    fetch: &Json,
    info: &mut FetchInfo,
    pref: &SourcePreference,
) -> Result<CompiledSpec> {
    let spec = Compiler { info }.node(fetch, pref)?;
    trace!(spec = %spec, "fetch spec compiled");
    Ok(spec)
}

struct Compiler<'a> {
    info: &'a mut FetchInfo,
}

impl Compiler<'_> {
    fn node(&mut self, fetch: &Json, pref: &SourcePreference) -> Result<CompiledSpec> {
        let dict = fetch
            .as_object()
            .ok_or_else(|| MedialibError::invalid("fetch specification must be a dict"))?;
        let ty = match dict.get("type") {
            None => "metadata",
            Some(Json::String(ty)) => ty.as_str(),
            Some(_) => return Err(MedialibError::invalid("'type' must be a string")),
        };
        match ty {
            "metadata" => self.metadata(dict, pref).map(CompiledSpec::Metadata),
            "cluster-list" => self.cluster(dict, pref).map(CompiledSpec::ClusterList),
            "cluster-dict" => self.cluster(dict, pref).map(CompiledSpec::ClusterDict),
            "organize" => self.organize(dict, pref).map(CompiledSpec::Organize),
            "count" => Ok(CompiledSpec::Count),
            other => Err(MedialibError::invalid(format!(
                "Unknown fetch type: '{other}'"
            ))),
        }
    }

    fn metadata(&mut self, dict: &Map<String, Json>, pref: &SourcePreference) -> Result<MetadataSpec> {
        let pref = source_preference(dict, pref)?;
        let get = parse_get(dict.get("get"))?;
        let aggregate = match dict.get("aggregate") {
            None => Aggregate::default(),
            Some(Json::String(name)) => name.parse()?,
            Some(_) => return Err(MedialibError::invalid("'aggregate' must be a string")),
        };
        let fields = parse_fields(dict.get("fields"))?;

        let node = self.info.allocate_node();
        let columns = if fields.is_empty() {
            vec![self.info.add_key(node, None, &pref)]
        } else {
            fields
                .iter()
                .map(|field| self.info.add_key(node, Some(field), &pref))
                .collect()
        };
        Ok(MetadataSpec {
            node,
            get,
            columns,
            aggregate,
        })
    }

    fn cluster(&mut self, dict: &Map<String, Json>, pref: &SourcePreference) -> Result<ClusterSpec> {
        let pref = source_preference(dict, pref)?;
        let by = match dict.get("cluster-by") {
            None => ClusterBy::default(),
            Some(Json::String(name)) => name.parse()?,
            Some(_) => return Err(MedialibError::invalid("'cluster-by' must be a string")),
        };
        let field = match (by, dict.get("cluster-field")) {
            (ClusterBy::Value, None) => {
                return Err(MedialibError::invalid(
                    "'cluster-field' is required when clustering by value",
                ))
            }
            (ClusterBy::Value, Some(Json::String(field))) => Some(field.as_str()),
            (ClusterBy::Value, Some(_)) => {
                return Err(MedialibError::invalid("'cluster-field' must be a string"))
            }
            _ => None,
        };
        let fallback = match dict.get("cluster-fallback") {
            None => None,
            Some(Json::String(fallback)) => Some(fallback.clone()),
            Some(_) => return Err(MedialibError::invalid("'cluster-fallback' must be a string")),
        };
        let data = dict
            .get("data")
            .ok_or_else(|| MedialibError::invalid("'data' is required for cluster fetches"))?;
        let data = self.node(data, &pref)?;

        let node = self.info.allocate_node();
        let column = match by {
            ClusterBy::Id => Some(ID_COLUMN),
            ClusterBy::Position => None,
            ClusterBy::Value => Some(self.info.add_key(node, field, &pref)),
        };
        Ok(ClusterSpec {
            node,
            by,
            column,
            fallback,
            data: Box::new(data),
        })
    }

    fn organize(&mut self, dict: &Map<String, Json>, pref: &SourcePreference) -> Result<OrganizeSpec> {
        let data = match dict.get("data") {
            Some(Json::Object(data)) => data,
            Some(_) => return Err(MedialibError::invalid("'data' must be a dict")),
            None => return Err(MedialibError::invalid("'data' is required for organize fetches")),
        };
        if data.is_empty() {
            return Err(MedialibError::invalid("'data' must not be empty"));
        }
        let entries = data
            .iter()
            .map(|(key, child)| Ok((key.clone(), self.node(child, pref)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(OrganizeSpec { entries })
    }
}

fn parse_get(get: Option<&Json>) -> Result<SmallVec<[GetField; 4]>> {
    let items = match get {
        Some(Json::Array(items)) => items,
        Some(_) => return Err(MedialibError::invalid("'get' must be a list")),
        None => return Err(MedialibError::invalid("'get' is required for metadata fetches")),
    };
    if items.is_empty() {
        return Err(MedialibError::invalid("'get' must not be empty"));
    }
    let mut seen = 0u8;
    let mut out = SmallVec::new();
    for item in items {
        let name = item
            .as_str()
            .ok_or_else(|| MedialibError::invalid("'get' entries must be strings"))?;
        let field: GetField = name.parse()?;
        if seen & field.bit() != 0 {
            return Err(MedialibError::invalid(format!(
                "'get' must not contain duplicates ('{name}')"
            )));
        }
        seen |= field.bit();
        out.push(field);
    }
    Ok(out)
}

fn parse_fields(fields: Option<&Json>) -> Result<Vec<String>> {
    let items = match fields {
        None => return Ok(Vec::new()),
        Some(Json::Array(items)) => items,
        Some(_) => return Err(MedialibError::invalid("'fields' must be a list")),
    };
    let mut seen = FxHashSet::default();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let name = item
            .as_str()
            .ok_or_else(|| MedialibError::invalid("'fields' entries must be strings"))?;
        if !seen.insert(name) {
            return Err(MedialibError::invalid(format!(
                "'fields' must not contain duplicates ('{name}')"
            )));
        }
        out.push(name.to_owned());
    }
    Ok(out)
}

fn source_preference(dict: &Map<String, Json>, inherited: &SourcePreference) -> Result<SourcePreference> {
    let Some(value) = dict.get("source-preference") else {
        return Ok(inherited.clone());
    };
    let items = value
        .as_array()
        .ok_or_else(|| MedialibError::invalid("'source-preference' must be a list"))?;
    let patterns = items
        .iter()
        .map(|item| {
            item.as_str().ok_or_else(|| {
                MedialibError::invalid("'source-preference' entries must be strings")
            })
        })
        .collect::<Result<Vec<_>>>()?;
    SourcePreference::new(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn pref() -> SourcePreference {
        SourcePreference::new(["server", "plugin/*", "*"]).unwrap()
    }

    fn compile_json(fetch: Json) -> Result<(CompiledSpec, FetchInfo)> {
        let pref = pref();
        let mut info = FetchInfo::new(&pref);
        let spec = compile(&fetch, &mut info, &pref)?;
        Ok((spec, info))
    }

    fn err_message(fetch: Json) -> String {
        let err = compile_json(fetch).expect_err("compile should fail");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        err.to_string()
    }

    #[test]
    fn metadata_defaults() {
        let (spec, info) = compile_json(json!({"get": ["value"], "fields": ["artist", "title"]})).unwrap();
        let CompiledSpec::Metadata(meta) = spec else {
            panic!("expected metadata");
        };
        assert_eq!(meta.aggregate, Aggregate::First);
        assert_eq!(meta.get.as_slice(), &[GetField::Value]);
        assert_eq!(meta.columns, vec![1, 2]);
        assert_eq!(info.column_count(), 3);
    }

    #[test]
    fn metadata_without_fields_fetches_everything() {
        let (spec, info) = compile_json(json!({"type": "metadata", "get": ["field", "value"], "fields": []})).unwrap();
        let CompiledSpec::Metadata(meta) = spec else {
            panic!("expected metadata");
        };
        assert_eq!(meta.columns.len(), 1);
        assert_eq!(info.fetch_spec().column(meta.columns[0]).unwrap().key, None);
    }

    #[test]
    fn id_field_maps_to_identifier_column() {
        let (spec, info) = compile_json(json!({"get": ["value"], "fields": ["id"]})).unwrap();
        let CompiledSpec::Metadata(meta) = spec else {
            panic!("expected metadata");
        };
        assert_eq!(meta.columns, vec![ID_COLUMN]);
        assert_eq!(info.column_count(), 1);
    }

    #[test]
    fn rejects_bad_metadata() {
        assert!(err_message(json!({"get": ["bogus"]})).contains("bogus"));
        assert!(err_message(json!({"get": []})).contains("must not be empty"));
        assert!(err_message(json!({"get": "value"})).contains("must be a list"));
        assert!(err_message(json!({"get": ["id", "id"]})).contains("duplicates"));
        assert!(err_message(json!({"get": ["id"], "aggregate": "median"})).contains("median"));
        assert!(err_message(json!({"get": ["id"], "fields": ["a", "a"]})).contains("duplicates"));
        assert!(err_message(json!({"get": ["id"], "fields": [1]})).contains("strings"));
        assert!(err_message(json!({"fields": ["a"]})).contains("required"));
    }

    #[test]
    fn rejects_unknown_type_and_non_dict() {
        assert!(err_message(json!({"type": "bogus"})).contains("Unknown fetch type"));
        assert!(err_message(json!(["metadata"])).contains("must be a dict"));
        assert!(err_message(json!({"type": 3})).contains("'type'"));
    }

    #[test]
    fn cluster_by_value_requires_field() {
        let msg = err_message(json!({"type": "cluster-list", "data": {"type": "count"}}));
        assert!(msg.contains("cluster-field"));
        let msg = err_message(json!({"type": "cluster-list", "cluster-by": "id"}));
        assert!(msg.contains("'data'"));
        let msg = err_message(json!({
            "type": "cluster-dict", "cluster-by": "position",
            "cluster-fallback": 3, "data": {"type": "count"}
        }));
        assert!(msg.contains("cluster-fallback"));
    }

    #[test]
    fn cluster_columns_by_mode() {
        let (spec, _) = compile_json(json!({
            "type": "cluster-dict", "cluster-field": "artist", "data": {"type": "count"}
        }))
        .unwrap();
        let CompiledSpec::ClusterDict(cluster) = spec else {
            panic!("expected cluster-dict");
        };
        assert_eq!(cluster.by, ClusterBy::Value);
        assert_eq!(cluster.column, Some(1));
        assert_eq!(*cluster.data, CompiledSpec::Count);

        let (spec, _) = compile_json(json!({
            "type": "cluster-list", "cluster-by": "id", "data": {"type": "count"}
        }))
        .unwrap();
        let CompiledSpec::ClusterList(cluster) = spec else {
            panic!("expected cluster-list");
        };
        assert_eq!(cluster.column, Some(ID_COLUMN));

        let (spec, _) = compile_json(json!({
            "type": "cluster-list", "cluster-by": "position", "data": {"type": "count"}
        }))
        .unwrap();
        let CompiledSpec::ClusterList(cluster) = spec else {
            panic!("expected cluster-list");
        };
        assert_eq!(cluster.column, None);
    }

    #[test]
    fn nested_error_aborts_parent() {
        let msg = err_message(json!({
            "type": "organize",
            "data": {
                "ok": {"type": "count"},
                "bad": {"type": "cluster-list", "cluster-field": "artist", "data": {"get": ["nope"]}}
            }
        }));
        assert!(msg.contains("nope"));
    }

    #[test]
    fn organize_keeps_declared_keys() {
        let (spec, _) = compile_json(json!({
            "type": "organize",
            "data": {"zeta": {"type": "count"}, "ids": {"get": ["id"]}, "alpha": {"type": "count"}}
        }))
        .unwrap();
        let CompiledSpec::Organize(org) = spec else {
            panic!("expected organize");
        };
        let keys: Vec<_> = org.entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "ids", "alpha"]);
        assert!(err_message(json!({"type": "organize", "data": {}})).contains("must not be empty"));
        assert!(err_message(json!({"type": "organize", "data": []})).contains("must be a dict"));
    }

    #[test]
    fn source_preference_overrides_and_validates() {
        let (spec, info) = compile_json(json!({
            "get": ["value"], "fields": ["artist"], "source-preference": ["plugin/id3v2"]
        }))
        .unwrap();
        let CompiledSpec::Metadata(meta) = spec else {
            panic!("expected metadata");
        };
        let column = info.fetch_spec().column(meta.columns[0]).unwrap();
        assert_eq!(column.pref.patterns(), &["plugin/id3v2".to_owned()]);
        assert!(err_message(json!({"get": ["value"], "source-preference": "server"})).contains("must be a list"));
    }
}
