use crate::ErrorKind;

/// Response buffer abstraction
///
/// Replies are built in place, so on `no_std` any fixed-capacity vector works.
pub trait VectorTrait<T: Copy> {
    fn push(&mut self, value: T) -> Result<(), ErrorKind>;
    fn extend(&mut self, other: &[T]) -> Result<(), ErrorKind>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
    fn clear(&mut self);
    fn as_slice(&self) -> &[T];
}

#[cfg(any(feature = "std", feature = "alloc", test))]
impl<T: Copy> VectorTrait<T> for alloc::vec::Vec<T> {
    #[inline]
    fn push(&mut self, value: T) -> Result<(), ErrorKind> {
        alloc::vec::Vec::push(self, value);
        Ok(())
    }
    #[inline]
    fn extend(&mut self, values: &[T]) -> Result<(), ErrorKind> {
        alloc::vec::Vec::extend_from_slice(self, values);
        Ok(())
    }
    #[inline]
    fn len(&self) -> usize {
        alloc::vec::Vec::len(self)
    }
    #[inline]
    fn is_empty(&self) -> bool {
        alloc::vec::Vec::is_empty(self)
    }
    #[inline]
    fn clear(&mut self) {
        alloc::vec::Vec::clear(self);
    }
    #[inline]
    fn as_slice(&self) -> &[T] {
        alloc::vec::Vec::as_slice(self)
    }
}

#[cfg(feature = "fixedvec")]
impl<'a, T: Copy> VectorTrait<T> for fixedvec::FixedVec<'a, T> {
    #[inline]
    fn push(&mut self, value: T) -> Result<(), ErrorKind> {
        fixedvec::FixedVec::push(self, value).map_err(|_| ErrorKind::OOB)
    }
    #[inline]
    fn extend(&mut self, values: &[T]) -> Result<(), ErrorKind> {
        fixedvec::FixedVec::push_all(self, values).map_err(|_| ErrorKind::OOB)
    }
    #[inline]
    fn len(&self) -> usize {
        fixedvec::FixedVec::len(self)
    }
    #[inline]
    fn is_empty(&self) -> bool {
        fixedvec::FixedVec::is_empty(self)
    }
    #[inline]
    fn clear(&mut self) {
        fixedvec::FixedVec::clear(self);
    }
    #[inline]
    fn as_slice(&self) -> &[T] {
        fixedvec::FixedVec::as_slice(self)
    }
}

impl<T: Copy, const N: usize> VectorTrait<T> for heapless::Vec<T, N> {
    #[inline]
    fn push(&mut self, value: T) -> Result<(), ErrorKind> {
        heapless::Vec::push(self, value).map_err(|_| ErrorKind::OOB)
    }
    #[inline]
    fn extend(&mut self, values: &[T]) -> Result<(), ErrorKind> {
        self.extend_from_slice(values).map_err(|_| ErrorKind::OOB)
    }
    #[inline]
    fn len(&self) -> usize {
        <[T]>::len(self)
    }
    #[inline]
    fn is_empty(&self) -> bool {
        <[T]>::is_empty(self)
    }
    #[inline]
    fn clear(&mut self) {
        heapless::Vec::clear(self);
    }
    #[inline]
    fn as_slice(&self) -> &[T] {
        heapless::Vec::as_slice(self)
    }
}
