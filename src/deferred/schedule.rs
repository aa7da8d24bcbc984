//! The fixed per-frame pass order.
//!
//! Each stage's inputs are the previous stage's outputs, so the order is
//! not negotiable. The executor walks the schedule produced here rather
//! than hard-coding the sequence, which keeps the ordering testable
//! without a GPU.

/// One stage of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassStage {
    /// Rasterize the render list into the G-buffer.
    Geometry,
    /// Render scene depth from the light's point of view.
    ShadowDepth,
    /// Shade a full-screen quad from the G-buffer (+ shadow map).
    LightAccumulation,
    /// Copy G-buffer depth into the scene target for forward draws.
    DepthResolve,
    /// Screen-space bloom over the composited scene.
    Bloom,
    /// Blit the scene target to the surface.
    Present,
}

/// The stage order for one frame with the given features enabled.
pub fn frame_schedule(shadows: bool, bloom: bool) -> Vec<PassStage> {
    let mut stages = Vec::with_capacity(6);
    stages.push(PassStage::Geometry);
    if shadows {
        stages.push(PassStage::ShadowDepth);
    }
    stages.push(PassStage::LightAccumulation);
    stages.push(PassStage::DepthResolve);
    if bloom {
        stages.push(PassStage::Bloom);
    }
    stages.push(PassStage::Present);
    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(stages: &[PassStage], stage: PassStage) -> usize {
        stages.iter().position(|&s| s == stage).unwrap()
    }

    #[test]
    fn geometry_always_runs_first_and_present_last() {
        for shadows in [false, true] {
            for bloom in [false, true] {
                let stages = frame_schedule(shadows, bloom);
                assert_eq!(stages.first(), Some(&PassStage::Geometry));
                assert_eq!(stages.last(), Some(&PassStage::Present));
            }
        }
    }

    #[test]
    fn shadow_depth_completes_before_light_accumulation() {
        let stages = frame_schedule(true, false);
        assert!(
            position(&stages, PassStage::ShadowDepth)
                < position(&stages, PassStage::LightAccumulation)
        );
    }

    #[test]
    fn depth_resolve_follows_light_accumulation() {
        let stages = frame_schedule(true, true);
        assert!(
            position(&stages, PassStage::LightAccumulation)
                < position(&stages, PassStage::DepthResolve)
        );
    }

    #[test]
    fn bloom_sits_between_depth_resolve_and_present() {
        let stages = frame_schedule(false, true);
        let bloom = position(&stages, PassStage::Bloom);
        assert!(position(&stages, PassStage::DepthResolve) < bloom);
        assert!(bloom < position(&stages, PassStage::Present));
    }

    #[test]
    fn shadow_stage_is_absent_when_disabled() {
        let stages = frame_schedule(false, false);
        assert!(!stages.contains(&PassStage::ShadowDepth));
        assert!(!stages.contains(&PassStage::Bloom));
        assert_eq!(
            stages,
            vec![
                PassStage::Geometry,
                PassStage::LightAccumulation,
                PassStage::DepthResolve,
                PassStage::Present,
            ]
        );
    }
}
