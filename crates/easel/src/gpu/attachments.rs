/// Depth/stencil format backing every render pass.
pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

struct AttachmentTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Attachment textures for the frame: the multisampled color target (only
/// when multisampling is on; otherwise passes render straight into the
/// swap image) and the depth/stencil target.
///
/// The sample count is fixed at construction; pipelines compiled while this
/// set is active must match it. Exactly one live instance of each texture
/// exists at a time: reconfiguring destroys the prior instance before
/// creating its replacement.
pub(crate) struct AttachmentSet {
    color_format: wgpu::TextureFormat,
    sample_count: u32,
    extent: wgpu::Extent3d,
    msaa: Option<AttachmentTarget>,
    depth: Option<AttachmentTarget>,
}

impl AttachmentSet {
    pub fn new(color_format: wgpu::TextureFormat, sample_count: u32) -> Self {
        Self {
            color_format,
            sample_count,
            extent: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            msaa: None,
            depth: None,
        }
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        self.extent
    }

    /// View of the multisampled color target, when multisampling is on.
    pub fn msaa_view(&self) -> Option<&wgpu::TextureView> {
        self.msaa.as_ref().map(|target| &target.view)
    }

    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.depth.as_ref().map(|target| &target.view)
    }

    /// (Re)creates the attachment textures at the given extent.
    ///
    /// Must be invoked at initialization and whenever the output size
    /// changes. Prior textures are destroyed before their replacements are
    /// created.
    pub fn configure(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.extent = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };

        if let Some(old) = self.msaa.take() {
            old.texture.destroy();
        }
        if self.sample_count > 1 {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("msaa color target"),
                size: self.extent,
                mip_level_count: 1,
                sample_count: self.sample_count,
                dimension: wgpu::TextureDimension::D2,
                format: self.color_format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            self.msaa = Some(AttachmentTarget { texture, view });
        }

        if let Some(old) = self.depth.take() {
            old.texture.destroy();
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth target"),
            size: self.extent,
            mip_level_count: 1,
            sample_count: self.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.depth = Some(AttachmentTarget { texture, view });

        tracing::debug!(
            width = self.extent.width,
            height = self.extent.height,
            sample_count = self.sample_count,
            "attachments configured"
        );
    }

    /// Destroys owned attachment textures. Safe to call when they were
    /// never created, and safe to call twice.
    pub fn dispose(&mut self) {
        if let Some(target) = self.msaa.take() {
            target.texture.destroy();
        }
        if let Some(target) = self.depth.take() {
            target.texture.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn configure_tracks_extent_and_recreates_targets() {
        let Some((device, _queue)) = testutil::device() else {
            return;
        };

        let mut attachments = AttachmentSet::new(wgpu::TextureFormat::Rgba8UnormSrgb, 4);
        attachments.configure(&device, 800, 600);
        assert_eq!(attachments.extent().width, 800);
        assert!(attachments.msaa_view().is_some());
        assert!(attachments.depth_view().is_some());

        attachments.configure(&device, 400, 300);
        assert_eq!(attachments.extent().width, 400);
        assert_eq!(attachments.extent().height, 300);
        assert_eq!(attachments.extent().depth_or_array_layers, 1);
        assert!(attachments.msaa_view().is_some());
    }

    #[test]
    fn single_sample_set_has_no_msaa_target() {
        let Some((device, _queue)) = testutil::device() else {
            return;
        };

        let mut attachments = AttachmentSet::new(wgpu::TextureFormat::Rgba8UnormSrgb, 1);
        attachments.configure(&device, 64, 64);
        assert!(attachments.msaa_view().is_none());
        assert!(attachments.depth_view().is_some());
    }

    #[test]
    fn dispose_is_idempotent() {
        let Some((device, _queue)) = testutil::device() else {
            return;
        };

        let mut attachments = AttachmentSet::new(wgpu::TextureFormat::Rgba8UnormSrgb, 1);
        attachments.dispose();
        attachments.configure(&device, 32, 32);
        attachments.dispose();
        attachments.dispose();
        assert!(attachments.depth_view().is_none());
    }
}
