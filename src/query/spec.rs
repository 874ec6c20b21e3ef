//! Compiled fetch specification tree.

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::error::MedialibError;
use crate::query::fetch_info::NodeId;

/// One selector of a metadata leaf's `get` list.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum GetField {
    /// Entry identifier.
    Id,
    /// Attribute name.
    Field,
    /// Attribute value.
    Value,
    /// Attribute source.
    Source,
}

impl GetField {
    /// Bit used when checking a `get` list for duplicates.
    pub(crate) fn bit(self) -> u8 {
        match self {
            GetField::Id => 1,
            GetField::Field => 1 << 1,
            GetField::Value => 1 << 2,
            GetField::Source => 1 << 3,
        }
    }

    /// Name as written in a fetch spec.
    pub fn as_str(self) -> &'static str {
        match self {
            GetField::Id => "id",
            GetField::Field => "field",
            GetField::Value => "value",
            GetField::Source => "source",
        }
    }
}

impl FromStr for GetField {
    type Err = MedialibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(GetField::Id),
            "field" => Ok(GetField::Field),
            "value" => Ok(GetField::Value),
            "source" => Ok(GetField::Source),
            other => Err(MedialibError::invalid(format!(
                "unknown 'get' value '{other}', expected id, field, value or source"
            ))),
        }
    }
}

/// Fold applied to the values found for one output slot.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Aggregate {
    /// First value seen.
    #[default]
    First,
    /// Integer sum.
    Sum,
    /// Integer maximum.
    Max,
    /// Integer minimum.
    Min,
    /// Unique values in encounter order.
    Set,
    /// All values in encounter order.
    List,
    /// One value picked uniformly at random.
    Random,
    /// Integer mean, truncated.
    Avg,
}

impl Aggregate {
    /// Name as written in a fetch spec.
    pub fn as_str(self) -> &'static str {
        match self {
            Aggregate::First => "first",
            Aggregate::Sum => "sum",
            Aggregate::Max => "max",
            Aggregate::Min => "min",
            Aggregate::Set => "set",
            Aggregate::List => "list",
            Aggregate::Random => "random",
            Aggregate::Avg => "avg",
        }
    }
}

impl FromStr for Aggregate {
    type Err = MedialibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Aggregate::First),
            "sum" => Ok(Aggregate::Sum),
            "max" => Ok(Aggregate::Max),
            "min" => Ok(Aggregate::Min),
            "set" => Ok(Aggregate::Set),
            "list" => Ok(Aggregate::List),
            "random" => Ok(Aggregate::Random),
            "avg" => Ok(Aggregate::Avg),
            other => Err(MedialibError::invalid(format!(
                "unknown aggregate '{other}', expected first, sum, max, min, set, list, random or avg"
            ))),
        }
    }
}

/// How a cluster node buckets rows.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ClusterBy {
    /// By entry identifier.
    Id,
    /// By row ordinal.
    Position,
    /// By the value of `cluster-field`.
    #[default]
    Value,
}

impl FromStr for ClusterBy {
    type Err = MedialibError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(ClusterBy::Id),
            "position" => Ok(ClusterBy::Position),
            "value" => Ok(ClusterBy::Value),
            other => Err(MedialibError::invalid(format!(
                "unknown cluster-by '{other}', expected id, position or value"
            ))),
        }
    }
}

/// Metadata leaf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataSpec {
    /// Node handle the columns were registered under.
    pub node: NodeId,
    /// Selectors in request order; all but the last become dict keys.
    pub get: SmallVec<[GetField; 4]>,
    /// Physical columns to read: one per field, or the single all-fields column.
    pub columns: Vec<usize>,
    /// Fold applied at the leaves.
    pub aggregate: Aggregate,
}

/// Cluster node shared by `cluster-list` and `cluster-dict`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterSpec {
    /// Node handle the bucket column was registered under.
    pub node: NodeId,
    /// Bucketing mode.
    pub by: ClusterBy,
    /// Bucket column; `None` when clustering by position.
    pub column: Option<usize>,
    /// Bucket used for rows without a value in `column`.
    pub fallback: Option<String>,
    /// Spec materialized once per bucket.
    pub data: Box<CompiledSpec>,
}

/// Organize node: named children over the same rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrganizeSpec {
    /// Output keys with their child specs, in declaration order.
    pub entries: Vec<(String, CompiledSpec)>,
}

/// Compiled fetch specification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompiledSpec {
    /// Attribute data folded by an aggregate.
    Metadata(MetadataSpec),
    /// Clusters emitted as a list, first-seen order.
    ClusterList(ClusterSpec),
    /// Clusters emitted as a dict keyed by bucket.
    ClusterDict(ClusterSpec),
    /// Dict of independently materialized children.
    Organize(OrganizeSpec),
    /// Row count.
    Count,
}

impl CompiledSpec {
    /// Fetch type name as written in a fetch spec.
    pub fn type_name(&self) -> &'static str {
        match self {
            CompiledSpec::Metadata(_) => "metadata",
            CompiledSpec::ClusterList(_) => "cluster-list",
            CompiledSpec::ClusterDict(_) => "cluster-dict",
            CompiledSpec::Organize(_) => "organize",
            CompiledSpec::Count => "count",
        }
    }
}

impl fmt::Display for CompiledSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledSpec::Metadata(meta) => {
                let get: Vec<_> = meta.get.iter().map(|g| g.as_str()).collect();
                write!(
                    f,
                    "metadata(get={}, cols={:?}, aggregate={})",
                    get.join(","),
                    meta.columns,
                    meta.aggregate.as_str()
                )
            }
            CompiledSpec::ClusterList(cluster) | CompiledSpec::ClusterDict(cluster) => {
                write!(f, "{}(by={:?}, data={})", self.type_name(), cluster.by, cluster.data)
            }
            CompiledSpec::Organize(org) => {
                write!(f, "organize(")?;
                for (i, (key, child)) in org.entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}={child}")?;
                }
                write!(f, ")")
            }
            CompiledSpec::Count => write!(f, "count"),
        }
    }
}
