//! Render sink collaborator

use vol_format::DecodedFrame;

use crate::video::FrameBuffer;

/// Receives decoded meshes and color frames. How they reach the GPU is up to the host.
pub trait RenderSink {
    /// Called once per frame the player materializes.
    fn upload_mesh(&mut self, frame: &DecodedFrame);

    /// Called with the video frame matching the last uploaded mesh.
    fn upload_color(&mut self, _frame: &FrameBuffer) {}
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn upload_mesh(&mut self, _frame: &DecodedFrame) {}
}

/// Sink that keeps the last uploads, for headless hosts and tests
#[derive(Debug, Default, Clone)]
pub struct LatestFrameSink {
    pub mesh: Option<DecodedFrame>,
    pub color: Option<FrameBuffer>,
    pub mesh_uploads: u64,
    pub color_uploads: u64,
}

impl RenderSink for LatestFrameSink {
    fn upload_mesh(&mut self, frame: &DecodedFrame) {
        self.mesh = Some(frame.clone());
        self.mesh_uploads += 1;
    }

    fn upload_color(&mut self, frame: &FrameBuffer) {
        self.color = Some(frame.clone());
        self.color_uploads += 1;
    }
}

impl<S: RenderSink + ?Sized> RenderSink for &mut S {
    fn upload_mesh(&mut self, frame: &DecodedFrame) {
        (**self).upload_mesh(frame);
    }

    fn upload_color(&mut self, frame: &FrameBuffer) {
        (**self).upload_color(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Player, PlayerConfig};
    use vol_format::writer::write_vologram;
    use vol_format::{FrameBuilder, StreamHeader, VologramPaths};

    fn fixture(dir: &std::path::Path) -> VologramPaths {
        let frames: Vec<FrameBuilder> = (0..4)
            .map(|i| {
                let positions = vec![[i as f32; 3]; 3];
                if i == 0 {
                    FrameBuilder::keyframe(positions, vec![0, 1, 2], vec![[0.0; 2]; 3])
                } else {
                    FrameBuilder::tracked(positions)
                }
            })
            .collect();
        write_vologram(dir, &StreamHeader::new(12, 0), None, &frames).unwrap()
    }

    #[test]
    fn test_null_sink_player() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixture(dir.path());
        let mut player = Player::new(PlayerConfig::default(), NullSink);
        player.open(&paths.header, &paths.sequence).unwrap();
        player.skip_to(3).unwrap();
        assert_eq!(player.frame(), 3);
    }

    #[test]
    fn test_borrowed_sink_keeps_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let paths = fixture(dir.path());
        let mut sink = LatestFrameSink::default();
        {
            let mut player = Player::new(PlayerConfig::default(), &mut sink);
            player.open(&paths.header, &paths.sequence).unwrap();
            player.step().unwrap();
            player.step().unwrap();
        }
        assert_eq!(sink.mesh_uploads, 2);
        assert_eq!(sink.mesh.unwrap().frame_index, 1);
        assert!(sink.color.is_none());
    }
}
