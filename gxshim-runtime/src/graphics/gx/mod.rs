// GX (Graphics eXecutor): the GameCube GPU command layer.
//
// Submodules implement individual hardware subsystems; `GxProcessor` is the
// owned context that ties them to an image source and a render backend.

pub mod displaylist;
pub mod draw;
pub mod lighting;
#[cfg(feature = "wgpu")]
pub mod pipeline;
pub mod regs;
pub mod state;
pub mod tev;
pub mod transform;
pub mod vertex;

use log::warn;

use self::draw::DrawDispatcher;
use self::state::{GxState, VtxAttr, VtxInputType};
use self::tev::{ShaderProgram, TevAlphaArg, TevBias, TevColorArg, TevOp, TevRegId, TevScale};
use self::transform::ProjectionType;
use self::vertex::{GxPrimitive, VertexAssembler};
use crate::config::ShimConfig;
use crate::graphics::backend::RenderBackend;
use crate::runtime::telemetry::{FrameStats, GxTelemetry};
use crate::texture::loader::{ImageKey, ImageSource, ImageStore, TokenTable};

/// Top-level GX processor.
///
/// Owns the register file, the vertex capture buffer, draw dispatch and
/// telemetry. Calls mirror the GX SDK: configure registers, then bracket
/// vertex writes with [`begin`](Self::begin) / [`end`](Self::end). Display
/// lists go through [`call_display_list`](Self::call_display_list).
pub struct GxProcessor<B: RenderBackend, S: ImageSource = ImageStore> {
    state: GxState,
    assembler: VertexAssembler,
    dispatcher: DrawDispatcher,
    tokens: TokenTable,
    telemetry: GxTelemetry,
    backend: B,
    images: S,
    config: ShimConfig,
}

impl<B: RenderBackend> GxProcessor<B, ImageStore> {
    /// Processor with default settings and an empty in-memory image store.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, ImageStore::new(), ShimConfig::default())
    }
}

impl<B: RenderBackend, S: ImageSource> GxProcessor<B, S> {
    pub fn with_config(backend: B, images: S, config: ShimConfig) -> Self {
        Self {
            state: GxState::new(),
            assembler: VertexAssembler::new(config.vertex_buffer_capacity),
            dispatcher: DrawDispatcher::new(&config),
            tokens: TokenTable::new(),
            telemetry: GxTelemetry::new(),
            backend,
            images,
            config,
        }
    }

    // -- Accessors -------------------------------------------------------

    pub fn state(&self) -> &GxState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GxState {
        &mut self.state
    }

    pub fn tokens(&self) -> &TokenTable {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut TokenTable {
        &mut self.tokens
    }

    pub fn images(&self) -> &S {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut S {
        &mut self.images
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn telemetry(&self) -> &GxTelemetry {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut GxTelemetry {
        &mut self.telemetry
    }

    pub fn config(&self) -> &ShimConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &DrawDispatcher {
        &self.dispatcher
    }

    /// Give the backend back, e.g. to read recorded draws.
    pub fn into_backend(self) -> B {
        self.backend
    }

    // -- Vertex layout ---------------------------------------------------

    pub fn set_vtx_desc(&mut self, attr: VtxAttr, input_type: VtxInputType) {
        self.state.set_vtx_desc(attr, input_type);
    }

    pub fn clear_vtx_descs(&mut self) {
        self.state.clear_vtx_descs();
    }

    pub fn set_vtx_attr_fmt(&mut self, fmt: u8, attr: VtxAttr, count: u8, comp_type: u8, frac: u8) {
        self.state.set_vtx_attr_fmt(fmt, attr, count, comp_type, frac);
    }

    pub fn set_array(&mut self, attr: VtxAttr, base: ImageKey, stride: u32) {
        self.state.set_array(attr, base, stride);
    }

    // -- Combiner --------------------------------------------------------

    pub fn set_num_tev_stages(&mut self, n: u8) {
        self.state.set_num_tev_stages(n);
    }

    pub fn set_tev_order(&mut self, stage: u8, tex_coord: u8, tex_map: u8, channel: u8) {
        self.state.set_tev_order(stage, tex_coord, tex_map, channel);
    }

    pub fn set_tev_color_in(
        &mut self,
        stage: u8,
        a: TevColorArg,
        b: TevColorArg,
        c: TevColorArg,
        d: TevColorArg,
    ) {
        self.state.set_tev_color_in(stage, a, b, c, d);
    }

    pub fn set_tev_alpha_in(
        &mut self,
        stage: u8,
        a: TevAlphaArg,
        b: TevAlphaArg,
        c: TevAlphaArg,
        d: TevAlphaArg,
    ) {
        self.state.set_tev_alpha_in(stage, a, b, c, d);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_tev_color_op(
        &mut self,
        stage: u8,
        op: TevOp,
        bias: TevBias,
        scale: TevScale,
        clamp: bool,
        dest: TevRegId,
    ) {
        self.state
            .set_tev_color_op(stage, op, bias, scale, clamp, dest);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_tev_alpha_op(
        &mut self,
        stage: u8,
        op: TevOp,
        bias: TevBias,
        scale: TevScale,
        clamp: bool,
        dest: TevRegId,
    ) {
        self.state
            .set_tev_alpha_op(stage, op, bias, scale, clamp, dest);
    }

    // -- Textures and matrices -------------------------------------------

    pub fn set_tex_image(&mut self, map: u8, image: ImageKey, width: u16, height: u16, format: u8) {
        self.state.set_tex_image(map, image, width, height, format);
    }

    pub fn set_projection(&mut self, mtx: &[f32; 16], kind: ProjectionType) {
        self.state.set_projection(mtx, kind);
    }

    pub fn load_pos_mtx(&mut self, slot: u8, mtx: &[f32; 12]) {
        self.state.load_pos_mtx(slot, mtx);
    }

    pub fn set_current_mtx(&mut self, slot: u8) {
        self.state.set_current_mtx(slot);
    }

    // -- Vertex submission (GXBegin / GXEnd wrappers) --------------------

    pub fn begin(&mut self, primitive: GxPrimitive, vtx_fmt: u8, count: u16) {
        self.assembler.begin(&self.state, primitive, vtx_fmt, count);
    }

    /// Close the draw session and dispatch it. Returns the shader program
    /// used, or `None` when nothing was drawn.
    pub fn end(&mut self) -> Option<ShaderProgram> {
        let draw = self.assembler.end()?;
        if draw.truncated {
            warn!(
                "GX vertex capture overflowed ({} byte capacity); draw truncated to {} vertices",
                self.config.vertex_buffer_capacity, draw.vertex_count
            );
        }
        self.dispatcher.dispatch(
            &draw,
            &self.state,
            &self.images,
            &mut self.backend,
            &mut self.telemetry,
        )
    }

    pub fn finish_vertex(&mut self) {
        self.assembler.finish_vertex();
    }

    pub fn write_u8(&mut self, v: u8) {
        self.assembler.write_u8(v);
    }

    pub fn write_s8(&mut self, v: i8) {
        self.assembler.write_s8(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.assembler.write_u16(v);
    }

    pub fn write_s16(&mut self, v: i16) {
        self.assembler.write_s16(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.assembler.write_u32(v);
    }

    pub fn write_s32(&mut self, v: i32) {
        self.assembler.write_s32(v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.assembler.write_f32(v);
    }

    pub fn write_color(&mut self, rgba: [u8; 4]) {
        self.assembler.write_color(rgba);
    }

    pub fn position_3f32(&mut self, x: f32, y: f32, z: f32) {
        self.assembler.position_3f32(x, y, z);
    }

    pub fn position_3s16(&mut self, x: i16, y: i16, z: i16) {
        self.assembler.position_3s16(x, y, z);
    }

    pub fn normal_3f32(&mut self, x: f32, y: f32, z: f32) {
        self.assembler.normal_3f32(x, y, z);
    }

    pub fn color_4u8(&mut self, r: u8, g: u8, b: u8, a: u8) {
        self.assembler.color_4u8(r, g, b, a);
    }

    pub fn texcoord_2f32(&mut self, s: f32, t: f32) {
        self.assembler.texcoord_2f32(s, t);
    }

    // -- Frame lifecycle -------------------------------------------------

    pub fn begin_frame(&mut self) {
        self.telemetry.begin_frame();
        self.backend.begin_frame();
    }

    /// Finish the frame on the backend and return its statistics.
    pub fn end_frame(&mut self) -> FrameStats {
        self.backend.end_frame();
        self.telemetry.end_frame()
    }

    /// Reset all GX state to power-on defaults and release cached textures.
    pub fn reset(&mut self) {
        self.state.reset();
        self.dispatcher.clear_textures(&mut self.backend);
    }
}
