/// Stable catalog item identifier, also the byte-wise total-order sort key.
/// Example: `tip_00017`
pub type ItemId = String;
/// Calendar-day identifier in the fixed `%Y%m%d` form.
/// Compared only for equality, never ordinally. Example: `20240102`
pub type DayId = String;
/// Identifier for the catalog source that produced an item.
/// Examples: `tips`, `remote::tips`
pub type SourceId = String;
/// Opaque per-record commit revision used for optimistic commits.
/// `0` means the record has never been written.
pub type Revision = u64;
