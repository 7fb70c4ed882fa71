use std::num::NonZeroUsize;

pub const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(size) => size,
    None => unreachable!(),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a, T> {
    pub index: usize,
    pub items: &'a [T],
}

impl<T> Batch<'_, T> {
    pub fn offset(&self, batch_size: NonZeroUsize) -> usize {
        self.index * batch_size.get()
    }
}

pub fn batch_count(len: usize, batch_size: NonZeroUsize) -> usize {
    len.div_ceil(batch_size.get())
}

pub fn batches<T>(
    items: &[T],
    batch_size: NonZeroUsize,
) -> impl Iterator<Item = Batch<'_, T>> + Clone {
    items
        .chunks(batch_size.get())
        .enumerate()
        .map(|(index, items)| Batch { index, items })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    #[test]
    fn splits_with_short_tail() {
        let ids: Vec<usize> = (0..2500).collect();
        let chunks: Vec<_> = batches(&ids, size(1000)).collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|b| b.items.len()).collect::<Vec<_>>(),
            vec![1000, 1000, 500]
        );
        let flattened: Vec<usize> = chunks.iter().flat_map(|b| b.items.iter().copied()).collect();
        assert_eq!(flattened, ids);
        assert_eq!(chunks[2].index, 2);
        assert_eq!(chunks[2].offset(size(1000)), 2000);
        assert_eq!(batch_count(ids.len(), size(1000)), 3);
    }

    #[test]
    fn empty_list_has_no_batches() {
        let ids: Vec<u8> = Vec::new();
        assert_eq!(batches(&ids, size(10)).count(), 0);
        assert_eq!(batch_count(0, size(10)), 0);
    }

    #[test]
    fn iteration_restarts_from_the_same_list() {
        let ids = vec!["a", "b", "c"];
        let first: Vec<_> = batches(&ids, size(2)).collect();
        let second: Vec<_> = batches(&ids, size(2)).collect();
        assert_eq!(first, second);
        assert_eq!(batch_count(ids.len(), size(2)), 2);
    }
}
