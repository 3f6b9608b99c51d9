//! Zero-copy strided views over a backing slice.
//!
//! A view is `(backing, offset, stride, count)`: its `i`-th element is
//! `backing[offset + i * stride]`. Splitting a view into its even- and odd-indexed elements only
//! rewrites the descriptor, which is what lets the engine decimate its input at every recursion
//! level without copying.
//!
//! ### Example:
//! ```rust
//! use buffered_fft::view::StridedView;
//!
//! let samples = [0, 1, 2, 3, 4, 5, 6, 7];
//! let full = StridedView::full(&samples);
//!
//! let evens_of_odds: Vec<i32> = full.odds().evens().iter().copied().collect();
//! assert_eq!(evens_of_odds, [1, 5]);
//! ```

/// The `(offset, stride, count)` part of a view, independent of any backing storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Stride {
    offset: usize,
    stride: usize,
    count: usize,
}

impl Stride {
    /// Creates a layout selecting `count` elements starting at `offset`, `stride` apart.
    #[must_use]
    pub const fn new(offset: usize, stride: usize, count: usize) -> Self {
        Self {
            offset,
            stride,
            count,
        }
    }

    /// Layout covering `len` contiguous elements starting at zero.
    #[must_use]
    pub const fn full(len: usize) -> Self {
        Self::new(0, 1, len)
    }

    /// Elements at logical indices 0, 2, 4, … of `self`.
    #[must_use]
    pub const fn evens(self) -> Self {
        Self::new(self.offset, self.stride * 2, self.count.div_ceil(2))
    }

    /// Elements at logical indices 1, 3, 5, … of `self`.
    #[must_use]
    pub const fn odds(self) -> Self {
        Self::new(self.offset + self.stride, self.stride * 2, self.count / 2)
    }

    /// Backing index of the `i`-th logical element.
    #[inline]
    #[must_use]
    pub const fn index(self, i: usize) -> usize {
        self.offset + i * self.stride
    }

    /// Offset of the first element in the backing storage.
    #[must_use]
    pub const fn offset(self) -> usize {
        self.offset
    }

    /// Distance between consecutive elements in the backing storage.
    #[must_use]
    pub const fn stride(self) -> usize {
        self.stride
    }

    /// Number of elements selected.
    #[must_use]
    pub const fn count(self) -> usize {
        self.count
    }

    /// Whether every selected index is inside a backing slice of length `len`.
    #[must_use]
    pub const fn fits(self, len: usize) -> bool {
        self.count == 0 || self.index(self.count - 1) < len
    }
}

/// A shared view over a backing slice. Any number of views may alias the same slice.
#[derive(Debug)]
pub struct StridedView<'a, T> {
    backing: &'a [T],
    layout: Stride,
}

impl<T> Clone for StridedView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StridedView<'_, T> {}

impl<'a, T> StridedView<'a, T> {
    /// Creates a view selecting `count` elements of `backing` starting at `offset`, `stride`
    /// apart.
    ///
    /// # Panics
    /// Panics if the last selected index is outside `backing`.
    #[must_use]
    pub fn new(backing: &'a [T], offset: usize, stride: usize, count: usize) -> Self {
        Self::with_layout(backing, Stride::new(offset, stride, count))
    }

    /// Creates a view over `backing` with an existing layout.
    ///
    /// # Panics
    /// Panics if the last selected index is outside `backing`.
    #[must_use]
    pub fn with_layout(backing: &'a [T], layout: Stride) -> Self {
        assert!(
            layout.fits(backing.len()),
            "{layout:?} does not fit a backing slice of length {}",
            backing.len()
        );
        Self { backing, layout }
    }

    /// View over the whole of `backing`, stride 1.
    #[must_use]
    pub fn full(backing: &'a [T]) -> Self {
        Self {
            backing,
            layout: Stride::full(backing.len()),
        }
    }

    /// View of the even-indexed elements. O(1), no copy.
    #[must_use]
    pub fn evens(self) -> Self {
        Self {
            backing: self.backing,
            layout: self.layout.evens(),
        }
    }

    /// View of the odd-indexed elements. O(1), no copy.
    #[must_use]
    pub fn odds(self) -> Self {
        Self {
            backing: self.backing,
            layout: self.layout.odds(),
        }
    }

    /// The `i`-th logical element, borrowed straight from the backing slice.
    #[inline]
    #[must_use]
    pub fn at(&self, i: usize) -> &'a T {
        debug_assert!(i < self.layout.count);
        &self.backing[self.layout.index(i)]
    }

    /// Number of elements in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layout.count
    }

    /// Whether the view selects no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layout.count == 0
    }

    /// The view's layout.
    #[must_use]
    pub fn layout(&self) -> Stride {
        self.layout
    }

    /// The whole backing slice the view points into.
    #[must_use]
    pub fn backing(&self) -> &'a [T] {
        self.backing
    }

    /// Iterates the selected elements in logical order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &'a T> + 'a {
        let backing = self.backing;
        let layout = self.layout;
        (0..layout.count).map(move |i| &backing[layout.index(i)])
    }
}

/// An exclusive view over a backing slice, used for the region a transform level writes.
#[derive(Debug)]
pub struct StridedViewMut<'a, T> {
    backing: &'a mut [T],
    layout: Stride,
}

impl<'a, T> StridedViewMut<'a, T> {
    /// Creates a writable view over `backing` with an existing layout.
    ///
    /// # Panics
    /// Panics if the last selected index is outside `backing`.
    #[must_use]
    pub fn with_layout(backing: &'a mut [T], layout: Stride) -> Self {
        assert!(
            layout.fits(backing.len()),
            "{layout:?} does not fit a backing slice of length {}",
            backing.len()
        );
        Self { backing, layout }
    }

    /// Writable view over the whole of `backing`, stride 1.
    #[must_use]
    pub fn full(backing: &'a mut [T]) -> Self {
        let layout = Stride::full(backing.len());
        Self { backing, layout }
    }

    /// The `i`-th logical element.
    #[inline]
    #[must_use]
    pub fn at(&self, i: usize) -> &T {
        debug_assert!(i < self.layout.count);
        &self.backing[self.layout.index(i)]
    }

    /// The `i`-th logical element, mutably.
    #[inline]
    pub fn at_mut(&mut self, i: usize) -> &mut T {
        debug_assert!(i < self.layout.count);
        &mut self.backing[self.layout.index(i)]
    }

    /// Number of elements in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layout.count
    }

    /// Whether the view selects no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layout.count == 0
    }

    /// The view's layout.
    #[must_use]
    pub fn layout(&self) -> Stride {
        self.layout
    }

    /// Reborrows as a shared view with the same layout.
    #[must_use]
    pub fn as_view(&self) -> StridedView<'_, T> {
        StridedView {
            backing: self.backing,
            layout: self.layout,
        }
    }
}
