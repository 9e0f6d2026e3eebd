//! Property tests for vertex strides, index expansion and classification

use gxshim_runtime::graphics::gx::draw::{fan_indices, quad_indices};
use gxshim_runtime::graphics::gx::state::{GxState, VtxAttr, VtxInputType};
use gxshim_runtime::graphics::gx::tev::{classify, ShaderProgram, TevColorArg, TevStage};
use proptest::prelude::*;

fn numeric_size(attr: VtxAttr, count: u8, comp_type: u8) -> usize {
    let elements = match attr {
        VtxAttr::Position => [2, 3][count as usize],
        VtxAttr::Normal => [3, 9][count as usize],
        _ => [1, 2][count as usize],
    };
    let component = match comp_type {
        0 | 1 => 1,
        2 | 3 => 2,
        _ => 4,
    };
    elements * component
}

fn color_stream_size(comp_type: u8) -> usize {
    match comp_type {
        0 | 3 => 2,
        1 | 4 => 3,
        _ => 4,
    }
}

/// Build a register file from per-attribute (input type, count, comp type)
/// triples and return the expected (capture, stream) strides.
fn configure(attrs: &[(u8, u8, u8)], fmt: u8) -> (GxState, usize, usize) {
    let mut state = GxState::new();
    let mut capture = 0;
    let mut stream = 0;
    for (&attr, &(input, count, comp_type)) in VtxAttr::ALL.iter().zip(attrs) {
        let input = VtxInputType::from_bits(input as u32);
        state.set_vtx_desc(attr, input);
        state.set_vtx_attr_fmt(fmt, attr, count, comp_type, 0);
        let (c, s) = match input {
            VtxInputType::None => (0, 0),
            VtxInputType::Index8 => (1, 1),
            VtxInputType::Index16 => (2, 2),
            VtxInputType::Direct if attr.is_matrix_index() => (1, 1),
            VtxInputType::Direct if attr.is_color() => (4, color_stream_size(comp_type)),
            VtxInputType::Direct => {
                let n = numeric_size(attr, count, comp_type);
                (n, n)
            }
        };
        capture += c;
        stream += s;
    }
    (state, capture, stream)
}

fn attr_strategy() -> impl Strategy<Value = Vec<(u8, u8, u8)>> {
    prop::collection::vec((0u8..4, 0u8..2, 0u8..6), VtxAttr::COUNT)
}

fn stage_strategy() -> impl Strategy<Value = TevStage> {
    prop::array::uniform4(0u32..16).prop_map(|args| TevStage {
        color_in: args.map(TevColorArg::from_bits),
        ..TevStage::rasterized()
    })
}

proptest! {
    #[test]
    fn test_stride_is_sum_of_attribute_sizes(attrs in attr_strategy(), fmt in 0u8..8) {
        let (state, capture, stream) = configure(&attrs, fmt);
        prop_assert_eq!(state.stride(fmt), capture);
        prop_assert_eq!(state.stream_stride(fmt), stream);
    }

    #[test]
    fn test_other_formats_are_untouched(attrs in attr_strategy(), fmt in 0u8..8) {
        let (state, _, _) = configure(&attrs, fmt);
        let other = (fmt + 1) % 8;
        // Descriptors are shared; untouched format slots keep count 0 and U8.
        let (_, expected, _) = configure(
            &attrs.iter().map(|&(input, _, _)| (input, 0, 0)).collect::<Vec<_>>(),
            other,
        );
        prop_assert_eq!(state.stride(other), expected);
    }

    #[test]
    fn test_quad_indices_stay_within_their_quad(quads in 0usize..64) {
        let mut out = Vec::new();
        quad_indices(quads * 4, &mut out);
        prop_assert_eq!(out.len(), quads * 6);
        for tri in out.chunks_exact(3) {
            let group = tri[0] / 4;
            prop_assert!(tri.iter().all(|&i| i / 4 == group));
        }
    }

    #[test]
    fn test_fan_indices_share_the_hub(count in 3usize..256) {
        let mut out = Vec::new();
        fan_indices(count, &mut out);
        prop_assert_eq!(out.len(), 3 * (count - 2));
        for tri in out.chunks_exact(3) {
            prop_assert!(tri.contains(&0));
            prop_assert!(tri.iter().all(|&i| (i as usize) < count));
        }
    }

    #[test]
    fn test_classification_is_deterministic(
        s0 in stage_strategy(),
        s1 in stage_strategy(),
        num_stages in 0u8..4,
        has_color0 in any::<bool>(),
        textured in any::<bool>(),
    ) {
        let stages = [s0, s1];
        let first = classify(&stages, num_stages, has_color0, textured);
        let second = classify(&stages, num_stages, has_color0, textured);
        prop_assert_eq!(first, second);
        if !textured {
            prop_assert_eq!(first.program, ShaderProgram::PassThrough);
        }
    }
}
