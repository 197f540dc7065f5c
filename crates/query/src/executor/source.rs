//! Row source contract consumed by scan and lookup cursors.

use crate::error::SourceError;
use resumedb_core::{Row, RowId, Value};
use resumedb_storage::{IndexSeek, KeyRange, ScanDirection, SeekMode, Snapshot};
use std::sync::Arc;

pub type SourceResult<T> = Result<T, SourceError>;

/// Indexed and unindexed access to the records of one transaction.
///
/// Scans return bounded batches: a cursor asks for at most `limit` records
/// and re-opens after the last one it received when it needs more.
/// Resumption never relies on a physical position either. The seek methods
/// re-open a scan from key and identity values alone, so an anchor record
/// that was deleted or moved since capture does not matter.
pub trait RowSource: Send {
    /// False once the underlying transaction has ended.
    fn is_active(&self) -> bool {
        true
    }

    /// Number of columns of an extent.
    fn column_count(&self, extent: &str) -> SourceResult<usize>;

    /// At most `limit` records of an extent in storage order, starting
    /// after (or at) `after` when given.
    fn scan_extent_with_limit(
        &self,
        extent: &str,
        after: Option<(RowId, SeekMode)>,
        limit: Option<usize>,
    ) -> SourceResult<Vec<Arc<Row>>>;

    /// At most `limit` index entries within `range`, ordered by
    /// `(key, identity)` in `direction`, starting from `seek` when given.
    fn scan_index_with_limit(
        &self,
        extent: &str,
        index: &str,
        range: &KeyRange<Value>,
        direction: ScanDirection,
        seek: Option<IndexSeek<'_>>,
        limit: Option<usize>,
    ) -> SourceResult<Vec<(Value, Arc<Row>)>>;

    /// Every record of an extent in storage order.
    fn scan_all(&self, extent: &str) -> SourceResult<Vec<Arc<Row>>> {
        self.scan_extent_with_limit(extent, None, None)
    }

    /// Records of an extent after (or at) `identity` in storage order.
    fn seek_after_identity(&self, extent: &str, identity: RowId, mode: SeekMode) -> SourceResult<Vec<Arc<Row>>> {
        self.scan_extent_with_limit(extent, Some((identity, mode)), None)
    }

    /// Index entries within `range`, ordered by `(key, identity)` in
    /// `direction`.
    fn scan_index(
        &self,
        extent: &str,
        index: &str,
        range: &KeyRange<Value>,
        direction: ScanDirection,
    ) -> SourceResult<Vec<(Value, Arc<Row>)>> {
        self.scan_index_with_limit(extent, index, range, direction, None, None)
    }

    /// Like `scan_index`, starting after (or at) the seek anchor.
    fn seek_after_key(
        &self,
        extent: &str,
        index: &str,
        range: &KeyRange<Value>,
        direction: ScanDirection,
        seek: IndexSeek<'_>,
    ) -> SourceResult<Vec<(Value, Arc<Row>)>> {
        self.scan_index_with_limit(extent, index, range, direction, Some(seek), None)
    }

    /// Resolves an identity to its extent and record.
    fn lookup_by_identity(&self, identity: RowId) -> SourceResult<Option<(String, Arc<Row>)>>;

    /// Dereferences a reference value within `extent`.
    fn lookup_by_reference(&self, extent: &str, reference: &Value) -> SourceResult<Option<Arc<Row>>>;
}

impl RowSource for Snapshot {
    fn is_active(&self) -> bool {
        Snapshot::is_active(self)
    }

    fn column_count(&self, extent: &str) -> SourceResult<usize> {
        Ok(self.table(extent)?.schema().columns().len())
    }

    fn scan_extent_with_limit(
        &self,
        extent: &str,
        after: Option<(RowId, SeekMode)>,
        limit: Option<usize>,
    ) -> SourceResult<Vec<Arc<Row>>> {
        Ok(self.scan_with_limit(extent, after, limit)?)
    }

    fn scan_index_with_limit(
        &self,
        extent: &str,
        index: &str,
        range: &KeyRange<Value>,
        direction: ScanDirection,
        seek: Option<IndexSeek<'_>>,
        limit: Option<usize>,
    ) -> SourceResult<Vec<(Value, Arc<Row>)>> {
        Ok(self.index_scan_with_limit(extent, index, range, direction, seek, limit)?)
    }

    fn lookup_by_identity(&self, identity: RowId) -> SourceResult<Option<(String, Arc<Row>)>> {
        Ok(self
            .state()
            .get_object(identity)
            .map(|(extent, row)| (extent.to_string(), row)))
    }

    fn lookup_by_reference(&self, extent: &str, reference: &Value) -> SourceResult<Option<Arc<Row>>> {
        let table = self.table(extent)?;
        Ok(reference.as_reference().and_then(|id| table.get(id)))
    }
}

/// A source with no extents.
#[cfg(test)]
pub(crate) struct EmptySource;

#[cfg(test)]
impl RowSource for EmptySource {
    fn column_count(&self, extent: &str) -> SourceResult<usize> {
        Err(resumedb_core::Error::table_not_found(extent).into())
    }

    fn scan_extent_with_limit(
        &self,
        _extent: &str,
        _after: Option<(RowId, SeekMode)>,
        _limit: Option<usize>,
    ) -> SourceResult<Vec<Arc<Row>>> {
        Ok(Vec::new())
    }

    fn scan_index_with_limit(
        &self,
        _extent: &str,
        _index: &str,
        _range: &KeyRange<Value>,
        _direction: ScanDirection,
        _seek: Option<IndexSeek<'_>>,
        _limit: Option<usize>,
    ) -> SourceResult<Vec<(Value, Arc<Row>)>> {
        Ok(Vec::new())
    }

    fn lookup_by_identity(&self, _identity: RowId) -> SourceResult<Option<(String, Arc<Row>)>> {
        Ok(None)
    }

    fn lookup_by_reference(&self, _extent: &str, _reference: &Value) -> SourceResult<Option<Arc<Row>>> {
        Ok(None)
    }
}
