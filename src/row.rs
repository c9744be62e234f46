//! Row/field data model and the pool that recycles field-slice storage.

use std::sync::Mutex;

/// One field of a row. `value` may hold the matched null token's bytes when
/// `is_null` is true; callers must not rely on that content, only on the
/// flag. `quoted` records whether the source field was delimited (e.g. wrapped
/// in `"`); the empty-line policy needs it to tell a legitimate one-field row
/// holding an explicitly quoted empty string apart from a genuinely blank line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Field {
    pub value: Vec<u8>,
    pub is_null: bool,
    pub quoted: bool,
}

impl Field {
    pub fn text(value: Vec<u8>, quoted: bool) -> Self {
        Field {
            value,
            is_null: false,
            quoted,
        }
    }

    pub fn null(quoted: bool) -> Self {
        Field {
            value: Vec::new(),
            is_null: true,
            quoted,
        }
    }
}

/// One assembled row.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub row_id: i64,
    pub fields: Vec<Field>,
    pub length: i64,
}

const FIELD_SLICE_CAPACITY: usize = 16;

/// Mutex-guarded pool of reusable `Vec<Field>` backing storage.
///
/// `get()` hands out a zero-length vector with at least
/// `FIELD_SLICE_CAPACITY` capacity; `put()` truncates and stores it back.
/// Unbounded: callers that never recycle simply allocate one vector per row.
pub struct RowPool {
    free: Mutex<Vec<Vec<Field>>>,
}

impl RowPool {
    pub fn new() -> Self {
        RowPool {
            free: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self) -> Vec<Field> {
        let mut free = self.free.lock().unwrap();
        free.pop()
            .unwrap_or_else(|| Vec::with_capacity(FIELD_SLICE_CAPACITY))
    }

    pub fn put(&self, mut slice: Vec<Field>) {
        slice.clear();
        self.free.lock().unwrap().push(slice);
    }
}

impl Default for RowPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_preallocated_empty_slice() {
        let pool = RowPool::new();
        let slice = pool.get();
        assert!(slice.is_empty());
        assert!(slice.capacity() >= FIELD_SLICE_CAPACITY);
    }

    #[test]
    fn put_then_get_reuses_the_same_allocation_without_aliasing_contents() {
        let pool = RowPool::new();
        let mut slice = pool.get();
        slice.push(Field::text(b"a".to_vec(), false));
        slice.push(Field::text(b"b".to_vec(), false));
        let cap = slice.capacity();
        pool.put(slice);

        let reused = pool.get();
        assert!(reused.is_empty());
        assert_eq!(reused.capacity(), cap);
    }

    #[test]
    fn recycled_slices_never_alias_a_still_live_row() {
        let pool = RowPool::new();
        let mut live = pool.get();
        live.push(Field::text(b"live".to_vec(), false));

        let mut recycled = pool.get();
        recycled.push(Field::text(b"recycled".to_vec(), false));
        pool.put(recycled);

        // `live` must be untouched by recycling a different, unrelated slice.
        assert_eq!(live[0].value, b"live");
    }
}
