//! Text rendering of tensors.

use crate::alloc::BufferAllocator;
use crate::error::Result;
use crate::odometer::{IterationOrder, MultiIndexIter};
use crate::scalar::Scalar;
use crate::store::TensorStore;
use crate::view::TensorView;

/// One line per mode-0 fiber of a column-major array.
fn render_fibers<T: Scalar>(values: &[T], size: &[usize]) -> String {
    let fiber = size.first().copied().unwrap_or(1);
    let mut out = String::new();
    if fiber == 0 {
        return out;
    }
    for chunk in values.chunks(fiber) {
        let line: Vec<String> = chunk.iter().map(|v| format!("{:.3}", v)).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

impl<T: Scalar, A: BufferAllocator<T>> TensorStore<T, A> {
    /// Render the view's scalar elements, one mode-0 fiber per line.
    ///
    /// Blocked views are read through their aliases, so the text is the
    /// dense tensor the blocks describe.
    ///
    /// # Example
    ///
    /// ```
    /// use psym_tensor::TensorStore;
    ///
    /// let mut store = TensorStore::<f64>::new();
    /// let t = store.create_tensor(&[2, 2], None).unwrap();
    /// store.attach_buffer(&t, vec![1.0, 2.0, 3.0, 4.0], None).unwrap();
    /// assert_eq!(store.format_flat(&t).unwrap(), "1.000 2.000\n3.000 4.000\n");
    /// ```
    pub fn format_flat(&self, view: &TensorView) -> Result<String> {
        let values = self.to_flat_vec(view)?;
        Ok(render_fibers(&values, view.inner_size()))
    }

    /// Render a view block by block.
    ///
    /// Each block of a blocked view gets a header with its coordinate,
    /// whether it is stored or aliased, its base and its permutation,
    /// followed by its elements. Dense views render as
    /// [`format_flat`](Self::format_flat).
    pub fn format_tensor(&self, view: &TensorView) -> Result<String> {
        if !self.base(view.base)?.is_blocked() {
            return self.format_flat(view);
        }
        let mut out = String::new();
        for coord in MultiIndexIter::with_order(view.size(), IterationOrder::FirstFastest) {
            let block = self.block(view, &view.physical_index(&coord))?;
            let role = if block.is_canonical() { "stored" } else { "aliased" };
            out.push_str(&format!(
                "block {:?} {} base {} permutation {:?}\n",
                coord.as_slice(),
                role,
                block.base,
                block.permutation()
            ));
            for line in self.format_flat(block)?.lines() {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
        Ok(out)
    }
}
