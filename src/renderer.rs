use glow::{Context, HasContext as _};
use nalgebra::Matrix4;

use crate::scene::{VertexData, FLOATS_PER_VERTEX};

const STRIDE: i32 = (FLOATS_PER_VERTEX * 4) as i32;

/// One VBO holding triangles, then lines, then points.
pub struct GpuScene {
    program: glow::Program,
    vao:     glow::VertexArray,
    vbo:     glow::Buffer,
    triangle_vertices: i32,
    line_vertices: i32,
    point_vertices: i32,
    u_mvp:   glow::UniformLocation,
    /// Scene revision last uploaded.
    pub revision: Option<u64>,
}

unsafe impl Send for GpuScene {}
unsafe impl Sync for GpuScene {}

impl GpuScene {
    pub unsafe fn new(gl: &Context) -> Result<Self, String> {
        let program = {
            let vs = gl.create_shader(glow::VERTEX_SHADER)?;
            gl.shader_source(vs, r#"#version 300 es
                precision highp float;
                uniform mat4 u_mvp;
                layout(location = 0) in vec3 a_pos;
                layout(location = 1) in vec4 a_col;
                out vec4 v_col;
                void main() {
                    v_col        = a_col;
                    gl_PointSize = 4.0;
                    gl_Position  = u_mvp * vec4(a_pos, 1.0);
                }"#);
            gl.compile_shader(vs);
            if !gl.get_shader_compile_status(vs) {
                return Err(gl.get_shader_info_log(vs));
            }

            let fs = gl.create_shader(glow::FRAGMENT_SHADER)?;
            gl.shader_source(fs, r#"#version 300 es
                precision mediump float;
                in  vec4 v_col;
                out vec4 o_col;
                void main() { o_col = v_col; }"#);
            gl.compile_shader(fs);
            if !gl.get_shader_compile_status(fs) {
                return Err(gl.get_shader_info_log(fs));
            }

            let prog = gl.create_program()?;
            gl.attach_shader(prog, vs);
            gl.attach_shader(prog, fs);
            gl.link_program(prog);
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            if !gl.get_program_link_status(prog) {
                return Err(gl.get_program_info_log(prog));
            }
            prog
        };

        let vao = gl.create_vertex_array()?;
        let vbo = gl.create_buffer()?;

        gl.bind_vertex_array(Some(vao));
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, STRIDE, 0);
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 4, glow::FLOAT, false, STRIDE, 12);
        gl.bind_vertex_array(None);

        let u_mvp = gl
            .get_uniform_location(program, "u_mvp")
            .ok_or_else(|| "u_mvp uniform missing".to_string())?;

        Ok(Self {
            program,
            vao,
            vbo,
            triangle_vertices: 0,
            line_vertices: 0,
            point_vertices: 0,
            u_mvp,
            revision: None,
        })
    }

    pub unsafe fn upload(&mut self, gl: &Context, data: &VertexData, revision: u64) {
        let mut verts = Vec::with_capacity(data.triangles.len() + data.lines.len() + data.points.len());
        verts.extend_from_slice(&data.triangles);
        verts.extend_from_slice(&data.lines);
        verts.extend_from_slice(&data.points);

        gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
        gl.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice(&verts),
            glow::STATIC_DRAW,
        );
        self.triangle_vertices = (data.triangles.len() / FLOATS_PER_VERTEX) as i32;
        self.line_vertices = (data.lines.len() / FLOATS_PER_VERTEX) as i32;
        self.point_vertices = (data.points.len() / FLOATS_PER_VERTEX) as i32;
        self.revision = Some(revision);
    }

    pub unsafe fn paint(&self, gl: &Context, mvp: Matrix4<f32>) {
        gl.use_program(Some(self.program));
        gl.uniform_matrix_4_f32_slice(Some(&self.u_mvp), false, mvp.as_slice());
        gl.bind_vertex_array(Some(self.vao));

        gl.enable(glow::DEPTH_TEST);
        gl.clear(glow::DEPTH_BUFFER_BIT);
        gl.enable(glow::BLEND);
        gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);

        let mut first = 0;
        gl.draw_arrays(glow::TRIANGLES, first, self.triangle_vertices);
        first += self.triangle_vertices;
        gl.draw_arrays(glow::LINES, first, self.line_vertices);
        first += self.line_vertices;
        gl.draw_arrays(glow::POINTS, first, self.point_vertices);

        gl.disable(glow::DEPTH_TEST);
        gl.bind_vertex_array(None);
    }

    pub unsafe fn destroy(&self, gl: &Context) {
        gl.delete_program(self.program);
        gl.delete_vertex_array(self.vao);
        gl.delete_buffer(self.vbo);
    }
}
