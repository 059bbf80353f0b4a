/// Rounds a byte length up to the copy alignment the backend demands.
pub(crate) fn align_copy_size(len: u64) -> u64 {
    len.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}

/// Pool of transient upload buffers with deferred destruction.
///
/// A buffer referenced by a command stream that has not been submitted yet
/// must not be destroyed; every allocation is therefore registered here and
/// destroyed in one sweep after the frame's submission.
pub(crate) struct StagingPool {
    in_flight: Vec<wgpu::Buffer>,
}

impl StagingPool {
    pub fn new() -> Self {
        Self {
            in_flight: Vec::new(),
        }
    }

    /// Creates a copy-source buffer holding `bytes`, sized to the aligned
    /// rounding of the length, and registers it for deferred release.
    pub fn allocate(&mut self, device: &wgpu::Device, bytes: &[u8]) -> wgpu::Buffer {
        let size = align_copy_size(bytes.len() as u64).max(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging upload"),
            size,
            usage: wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: true,
        });
        {
            let mut mapped = buffer.slice(..).get_mapped_range_mut();
            mapped[..bytes.len()].copy_from_slice(bytes);
        }
        buffer.unmap();

        self.in_flight.push(buffer.clone());
        buffer
    }

    /// Destroys every buffer registered since the last call and clears the
    /// registry. Called exactly once per frame, strictly after the frame's
    /// command buffers have been submitted.
    pub fn release_deferred(&mut self) {
        for buffer in self.in_flight.drain(..) {
            buffer.destroy();
        }
    }

    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }
}
