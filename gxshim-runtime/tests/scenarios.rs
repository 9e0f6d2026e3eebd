//! End-to-end draws through the live API and display-list replay

use gxshim_runtime::graphics::gx::state::{CompType, TlutBinding, VtxAttr, VtxInputType};
use gxshim_runtime::graphics::gx::tev::{ShaderProgram, TevColorArg};
use gxshim_runtime::graphics::gx::vertex::GxPrimitive;
use gxshim_runtime::texture::{decode, TlutFormat};
use gxshim_runtime::{GxProcessor, RecordingBackend, ReplayFault};

fn cp(addr: u8, value: u32) -> Vec<u8> {
    let mut out = vec![0x08, addr];
    out.extend_from_slice(&value.to_be_bytes());
    out
}

fn bp(addr: u8, value: u32) -> Vec<u8> {
    let mut out = vec![0x61];
    out.extend_from_slice(&(((addr as u32) << 24) | (value & 0xFF_FFFF)).to_be_bytes());
    out
}

fn draw(opcode: u8, count: u16) -> Vec<u8> {
    let mut out = vec![opcode];
    out.extend_from_slice(&count.to_be_bytes());
    out
}

#[test]
fn test_untextured_triangle_passes_through() {
    let mut gx = GxProcessor::new(RecordingBackend::new());
    gx.set_vtx_desc(VtxAttr::Position, VtxInputType::Direct);
    gx.set_vtx_desc(VtxAttr::Color0, VtxInputType::Direct);
    gx.set_vtx_attr_fmt(0, VtxAttr::Position, 1, CompType::F32 as u8, 0);

    gx.begin_frame();
    gx.begin(GxPrimitive::Triangles, 0, 3);
    for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
        gx.position_3f32(x, y, 0.0);
        gx.color_4u8(255, 0, 0, 255);
    }
    assert_eq!(gx.end(), Some(ShaderProgram::PassThrough));
    let stats = gx.end_frame();

    let draws = gx.backend().draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].vertex_count, 3);
    assert!(draws[0].indices.is_none());
    assert!(draws[0].texture.is_none());
    assert_eq!(stats.untextured_draws, 1);
    assert_eq!(stats.textured_draws, 0);
    assert!(stats.is_valid());
}

#[test]
fn test_textured_quad_replaces() {
    let mut gx = GxProcessor::new(RecordingBackend::new());
    let texels: Vec<u8> = (0..32u8).collect();
    let image = gx.images_mut().insert(texels.clone());
    assert_eq!(decode(&texels, 8, 8, 0, None).len(), 256);

    gx.set_tex_image(0, image, 8, 8, 0);
    gx.set_tev_order(0, 0, 0, 4);
    gx.set_tev_color_in(
        0,
        TevColorArg::Zero,
        TevColorArg::Zero,
        TevColorArg::Zero,
        TevColorArg::Texc,
    );
    gx.set_vtx_desc(VtxAttr::Position, VtxInputType::Direct);
    gx.set_vtx_desc(VtxAttr::Tex0, VtxInputType::Direct);
    gx.set_vtx_attr_fmt(0, VtxAttr::Position, 1, CompType::F32 as u8, 0);
    gx.set_vtx_attr_fmt(0, VtxAttr::Tex0, 1, CompType::F32 as u8, 0);

    gx.begin_frame();
    gx.begin(GxPrimitive::Quads, 0, 4);
    for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
        gx.position_3f32(x, y, 0.0);
        gx.texcoord_2f32(x, y);
    }
    assert_eq!(gx.end(), Some(ShaderProgram::Replace));
    let stats = gx.end_frame();

    let draw = &gx.backend().draws()[0];
    assert_eq!(draw.indices.as_deref(), Some(&[0, 1, 2, 0, 2, 3][..]));
    let handle = draw.texture.expect("quad should be textured");
    assert_eq!(gx.backend().texture_size(handle), Some((8, 8)));
    assert_eq!(stats.textured_draws, 1);
    assert_eq!(stats.unique_textures, 1);
}

#[test]
fn test_palette_encoding_change_redecodes() {
    let mut gx = GxProcessor::new(RecordingBackend::new());
    let texels = gx.images_mut().insert(vec![0x01; 32]);
    let palette = gx.images_mut().insert((0..32u8).collect());

    gx.set_tex_image(0, texels, 8, 8, 0x8);
    gx.set_tev_order(0, 0, 0, 4);
    gx.set_tev_color_in(
        0,
        TevColorArg::Zero,
        TevColorArg::Zero,
        TevColorArg::Zero,
        TevColorArg::Texc,
    );
    gx.set_vtx_desc(VtxAttr::Position, VtxInputType::Direct);
    gx.set_vtx_attr_fmt(0, VtxAttr::Position, 1, CompType::F32 as u8, 0);

    let mut handles = Vec::new();
    for format in [TlutFormat::IA8, TlutFormat::RGB565, TlutFormat::IA8] {
        gx.state_mut().set_tex_tlut(
            0,
            Some(TlutBinding {
                image: palette,
                format,
            }),
        );
        gx.begin(GxPrimitive::Triangles, 0, 3);
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            gx.position_3f32(x, y, 0.0);
        }
        gx.end();
        handles.push(gx.backend().draws().last().and_then(|d| d.texture));
    }

    assert_eq!(gx.backend().textures_created(), 2);
    assert_ne!(handles[0], handles[1]);
    assert_eq!(handles[0], handles[2]);
}

#[test]
fn test_truncated_replay_draws_nothing() {
    let mut gx = GxProcessor::new(RecordingBackend::new());
    let mut list = cp(0x50, 1 << 9);
    list.extend(cp(0x70, 1 | (4 << 1)));
    let draw_at = list.len();
    list.extend(draw(0x90, 3));
    list.extend_from_slice(&[0; 10]);

    let report = gx.call_display_list(&list);
    assert_eq!(
        report.fault,
        Some(ReplayFault::Truncated {
            offset: draw_at,
            needed: 36,
            available: 10
        })
    );
    assert_eq!(report.commands, 2);
    assert_eq!(report.draws, 0);
    assert!(gx.backend().draws().is_empty());
    assert_eq!(gx.telemetry().lifetime().vertices, 0);
}

/// A display list that configures a textured quad entirely through
/// register writes, with the texture named by a token.
fn textured_quad_list() -> Vec<u8> {
    let mut list = cp(0x50, 1 << 9); // position direct
    list.extend(cp(0x60, 1)); // tex0 direct
    list.extend(cp(0x70, 1 | (4 << 1) | (1 << 21) | (4 << 22)));
    list.extend(bp(0x88, 7 | (7 << 10))); // 8x8 I4
    list.extend(bp(0x94, 0x100));
    list.extend(bp(0x28, 1 << 6)); // stage 0: map 0, coord 0, COLOR0A0
    list.extend(bp(0xC0, 0xFFF8)); // d = TEXC
    list.extend(draw(0x80, 4));
    for (x, y) in [(0.0f32, 0.0f32), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
        for v in [x, y, 0.0, x, y] {
            list.extend_from_slice(&v.to_be_bytes());
        }
    }
    list
}

#[test]
fn test_replayed_quad_matches_token_texture() {
    let mut gx = GxProcessor::new(RecordingBackend::new());
    let image = gx.images_mut().insert(vec![0xAB; 32]);
    gx.tokens_mut().register(0x100, image);

    let list = textured_quad_list();
    let report = gx.call_display_list(&list);
    assert!(report.is_complete(), "{:?}", report.fault);
    assert!(report.anomalies.is_empty());
    assert_eq!(report.draws, 1);
    assert_eq!(report.bytes_consumed, list.len());

    let draw = &gx.backend().draws()[0];
    assert_eq!(draw.program, ShaderProgram::Replace);
    assert_eq!(draw.vertex_count, 4);
    assert_eq!(draw.indices.as_ref().map(Vec::len), Some(6));
    assert!(draw.texture.is_some());
}

#[test]
fn test_replay_is_deterministic() {
    let run = || {
        let mut gx = GxProcessor::new(RecordingBackend::new());
        let image = gx.images_mut().insert((0..32).collect());
        gx.tokens_mut().register(0x100, image);
        gx.call_display_list(&textured_quad_list());
        gx.into_backend().digest()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_replay_and_live_calls_agree() {
    let mut replayed = GxProcessor::new(RecordingBackend::new());
    let mut list = cp(0x50, (1 << 9) | (1 << 13));
    list.extend(cp(0x70, 1 | (4 << 1) | (1 << 13) | (5 << 14)));
    list.extend(draw(0x90, 3));
    for i in 0..3 {
        for v in [i as f32, 1.0, 2.0] {
            list.extend_from_slice(&v.to_be_bytes());
        }
        list.extend_from_slice(&[10, 20, 30, 40]);
    }
    assert!(replayed.call_display_list(&list).is_complete());

    let mut live = GxProcessor::new(RecordingBackend::new());
    live.set_vtx_desc(VtxAttr::Position, VtxInputType::Direct);
    live.set_vtx_desc(VtxAttr::Color0, VtxInputType::Direct);
    live.set_vtx_attr_fmt(0, VtxAttr::Position, 1, CompType::F32 as u8, 0);
    live.set_vtx_attr_fmt(0, VtxAttr::Color0, 1, 5, 0);
    live.begin(GxPrimitive::Triangles, 0, 3);
    for i in 0..3 {
        live.position_3f32(i as f32, 1.0, 2.0);
        live.color_4u8(10, 20, 30, 40);
    }
    live.end();

    assert_eq!(replayed.state(), live.state());
    assert_eq!(replayed.backend().draws(), live.backend().draws());
}
