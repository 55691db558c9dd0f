//! Materialized procedure results

/// Rows returned by a result-bearing procedure
#[derive(Debug, Clone, PartialEq)]
pub enum ResultContainer<R> {
    /// Every row of the result set, in order
    Collection(Vec<R>),
    /// The first row, if any
    Single(Option<R>),
}

impl<R> ResultContainer<R> {
    pub fn is_collection(&self) -> bool {
        matches!(self, ResultContainer::Collection(_))
    }

    /// The single row. For a collection this is its first row.
    pub fn as_single(&self) -> Option<&R> {
        match self {
            ResultContainer::Collection(rows) => rows.first(),
            ResultContainer::Single(row) => row.as_ref(),
        }
    }

    /// All rows. A single result yields zero or one row.
    pub fn as_collection(&self) -> &[R] {
        match self {
            ResultContainer::Collection(rows) => rows,
            ResultContainer::Single(Some(row)) => std::slice::from_ref(row),
            ResultContainer::Single(None) => &[],
        }
    }

    pub fn into_single(self) -> Option<R> {
        match self {
            ResultContainer::Collection(rows) => rows.into_iter().next(),
            ResultContainer::Single(row) => row,
        }
    }

    pub fn into_vec(self) -> Vec<R> {
        match self {
            ResultContainer::Collection(rows) => rows,
            ResultContainer::Single(row) => row.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_collection().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_viewed_as_collection() {
        let single = ResultContainer::Single(Some(7));
        assert_eq!(single.as_collection(), &[7]);
        assert_eq!(single.len(), 1);

        let empty: ResultContainer<i32> = ResultContainer::Single(None);
        assert!(empty.as_collection().is_empty());
        assert!(empty.is_empty());
        assert_eq!(empty.into_vec(), Vec::<i32>::new());
    }

    #[test]
    fn test_collection_viewed_as_single() {
        let rows = ResultContainer::Collection(vec![1, 2, 3]);
        assert!(rows.is_collection());
        assert_eq!(rows.as_single(), Some(&1));
        assert_eq!(rows.clone().into_single(), Some(1));
        assert_eq!(rows.into_vec(), vec![1, 2, 3]);
    }
}
