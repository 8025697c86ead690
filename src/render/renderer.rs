//! Per-tick frame composition on the CPU raster backend.
//!
//! Draw order (later layers override earlier): background fill (image with
//! filter pass, or radial-gradient fallback), particles, logo, spectrum
//! graphic. All geometry scales by `height / 1080` so one settings document
//! looks the same on any surface size, while placement math stays on the
//! fixed 1920x1080 reference grid.

use crate::analysis::{TemporalSmoother, idle_bands, sample_bands};
use crate::foundation::core::{Canvas, Rgba8};
use crate::foundation::error::{StudioError, StudioResult};
use crate::render::frame::FrameRGBA;
use crate::render::particles::{ParticleField, bass_energy};
use crate::settings::{BgFilter, SpectrumStyle, VisualSettings};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;
use vello_cpu::kurbo::Shape as _;

const BASE_FILL: Rgba8 = Rgba8::rgb(0x0f, 0x17, 0x2a);
const FALLBACK_INNER: Rgba8 = Rgba8::rgb(0x1e, 0x29, 0x3b);

/// Frequency-magnitude snapshot for one tick.
#[derive(Clone, Copy, Debug)]
pub struct AudioSnapshot<'a> {
    /// One byte per linear-frequency bin, 0-255.
    pub magnitudes: &'a [u8],
    /// Sample rate of the analyzed signal in Hz.
    pub sample_rate: u32,
}

#[derive(Clone)]
struct ImagePaint {
    paint: vello_cpu::Image,
    w: u32,
    h: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct LinearGradientKey {
    top: [u8; 4],
    bottom: [u8; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct RadialGradientKey {
    inner: [u8; 4],
    outer: [u8; 4],
    r0: u32,
    r1: u32,
}

/// Composes one fixed-resolution visual frame per tick.
///
/// Owns the monotonic frame counter driving the idle animation, the temporal
/// smoother, and the particle field; reuses its render context and target
/// surface across frames so per-tick work stays proportional to band and
/// particle count.
pub struct FrameRenderer {
    canvas: Canvas,
    ctx: Option<vello_cpu::RenderContext>,
    target: Option<vello_cpu::Pixmap>,

    frame_count: u64,
    smoother: TemporalSmoother,
    particles: ParticleField,

    background: Option<ImagePaint>,
    logo: Option<ImagePaint>,

    linear_gradients: HashMap<LinearGradientKey, vello_cpu::Image>,
    radial_gradients: HashMap<RadialGradientKey, vello_cpu::Image>,
}

impl FrameRenderer {
    /// Create a renderer for the given surface size.
    pub fn new(canvas: Canvas) -> StudioResult<Self> {
        if canvas.width == 0 || canvas.height == 0 {
            return Err(StudioError::validation("canvas dimensions must be non-zero"));
        }
        if u16::try_from(canvas.width).is_err() || u16::try_from(canvas.height).is_err() {
            return Err(StudioError::validation("canvas dimensions exceed u16"));
        }
        Ok(Self {
            canvas,
            ctx: None,
            target: None,
            frame_count: 0,
            smoother: TemporalSmoother::new(),
            particles: ParticleField::new(0x5bec7),
            background: None,
            logo: None,
            linear_gradients: HashMap::new(),
            radial_gradients: HashMap::new(),
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Frames rendered since construction.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Set or clear the background image from encoded bytes (PNG/JPEG/...).
    pub fn set_background_image(&mut self, bytes: Option<&[u8]>) -> StudioResult<()> {
        self.background = match bytes {
            Some(b) => Some(decode_image_paint(b)?),
            None => None,
        };
        Ok(())
    }

    /// Set or clear the logo image from encoded bytes.
    pub fn set_logo_image(&mut self, bytes: Option<&[u8]>) -> StudioResult<()> {
        self.logo = match bytes {
            Some(b) => Some(decode_image_paint(b)?),
            None => None,
        };
        Ok(())
    }

    /// Render one frame.
    ///
    /// With `audio` present, bands come from the live magnitude snapshot;
    /// otherwise the deterministic idle animation keeps the preview moving.
    pub fn render(
        &mut self,
        settings: &VisualSettings,
        audio: Option<AudioSnapshot<'_>>,
    ) -> StudioResult<FrameRGBA> {
        settings.validate()?;
        self.frame_count += 1;

        let mut bands = match audio {
            Some(snap) => sample_bands(snap.magnitudes, snap.sample_rate, settings.band_count),
            None => idle_bands(self.frame_count, settings.band_count),
        };
        self.smoother.smooth(&mut bands);

        self.particles
            .sync(settings.particles_enabled, settings.particle_intensity);
        self.particles.update(bass_energy(&bands));

        let w16 = self.canvas.width as u16;
        let h16 = self.canvas.height as u16;
        let mut target = match self.target.take() {
            Some(pm) if pm.width() == w16 && pm.height() == h16 => pm,
            _ => vello_cpu::Pixmap::new(w16, h16),
        };
        target.data_as_u8_slice_mut().fill(0);

        self.with_ctx_mut(w16, h16, |this, ctx| {
            this.draw_scene(ctx, settings, &bands)?;
            ctx.flush();
            ctx.render_to_pixmap(&mut target);
            Ok(())
        })?;

        let out = FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: target.data_as_u8_slice().to_vec(),
            premultiplied: true,
        };
        self.target = Some(target);
        Ok(out)
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> StudioResult<R>,
    ) -> StudioResult<R> {
        let mut ctx = match self.ctx.take() {
            None => vello_cpu::RenderContext::new(width, height),
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            Some(_) => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(self, &mut ctx)?;
        self.ctx = Some(ctx);
        Ok(out)
    }

    fn draw_scene(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        settings: &VisualSettings,
        bands: &[f32],
    ) -> StudioResult<()> {
        let w = f64::from(self.canvas.width);
        let h = f64::from(self.canvas.height);
        let hs = self.canvas.vertical_correction();
        let full = vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h);

        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);

        self.draw_background(ctx, settings, full)?;
        self.draw_particles(ctx, w, h, hs);
        self.draw_logo(ctx, settings, w, h, hs);
        self.draw_spectrum(ctx, settings, bands, w, h, hs)?;
        Ok(())
    }

    fn draw_background(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        settings: &VisualSettings,
        full: vello_cpu::kurbo::Rect,
    ) -> StudioResult<()> {
        let (w, h) = (full.width(), full.height());

        ctx.set_paint(color_paint(BASE_FILL));
        ctx.fill_rect(&full);

        let Some(bg) = self.background.clone() else {
            // No image: radial gradient fallback, center out to the full width.
            let img = self.radial_gradient(FALLBACK_INNER, BASE_FILL, 0.0, w)?;
            ctx.set_paint(img);
            ctx.fill_rect(&full);
            return Ok(());
        };

        // Cover-fit: scale to fill, overflow cropped symmetrically.
        let ratio = (w / f64::from(bg.w)).max(h / f64::from(bg.h));
        let nw = f64::from(bg.w) * ratio;
        let nh = f64::from(bg.h) * ratio;
        let tr = vello_cpu::kurbo::Affine::translate(((w - nw) / 2.0, (h - nh) / 2.0))
            * vello_cpu::kurbo::Affine::scale(ratio);
        ctx.set_transform(tr);
        ctx.set_paint(bg.paint);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(bg.w),
            f64::from(bg.h),
        ));
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);

        match settings.bg_filter {
            BgFilter::None => {}
            BgFilter::Darken => {
                ctx.set_paint(color_paint(Rgba8::rgba(0, 0, 0, 153)));
                ctx.fill_rect(&full);
            }
            BgFilter::Vintage => {
                ctx.set_paint(color_paint(Rgba8::rgba(255, 200, 150, 38)));
                ctx.fill_rect(&full);
                let vignette = self.radial_gradient(
                    Rgba8::rgba(0, 0, 0, 0),
                    Rgba8::rgba(0, 0, 0, 153),
                    w / 4.0,
                    w,
                )?;
                ctx.set_paint(vignette);
                ctx.fill_rect(&full);
            }
            BgFilter::Blur => {
                // Translucent slate overlay approximating a blur pass.
                ctx.set_paint(color_paint(Rgba8::rgba(15, 23, 42, 128)));
                ctx.fill_rect(&full);
            }
        }
        Ok(())
    }

    fn draw_particles(&mut self, ctx: &mut vello_cpu::RenderContext, w: f64, h: f64, hs: f64) {
        if self.particles.is_empty() {
            return;
        }
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        for p in self.particles.particles() {
            let alpha = (p.opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
            ctx.set_paint(color_paint(Rgba8::rgba(255, 255, 255, alpha)));
            let circle = vello_cpu::kurbo::Circle::new(
                (f64::from(p.x) * w, f64::from(p.y) * h),
                f64::from(p.radius) * hs,
            );
            ctx.fill_path(&circle.to_path(0.1));
        }
    }

    fn draw_logo(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        settings: &VisualSettings,
        w: f64,
        h: f64,
        hs: f64,
    ) {
        let Some(logo) = self.logo.clone() else {
            return;
        };

        let lw = f64::from(logo.w) * f64::from(settings.logo_scale) * 0.4 * hs;
        let lh = f64::from(logo.h) * f64::from(settings.logo_scale) * 0.4 * hs;
        let lx = f64::from(settings.logo_x) / 100.0 * w - lw / 2.0;
        let ly = f64::from(settings.logo_y) / 100.0 * h - lh / 2.0;

        if settings.logo_remove_bg {
            // Screen blend drops a solid dark backing toward the backdrop.
            ctx.set_blend_mode(vello_cpu::peniko::BlendMode::new(
                vello_cpu::peniko::Mix::Screen,
                vello_cpu::peniko::Compose::SrcOver,
            ));
        }
        let tr = vello_cpu::kurbo::Affine::translate((lx, ly))
            * vello_cpu::kurbo::Affine::scale_non_uniform(
                lw / f64::from(logo.w),
                lh / f64::from(logo.h),
            );
        ctx.set_transform(tr);
        ctx.set_paint(logo.paint);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(logo.w),
            f64::from(logo.h),
        ));
        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    }

    fn draw_spectrum(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        settings: &VisualSettings,
        bands: &[f32],
        w: f64,
        h: f64,
        hs: f64,
    ) -> StudioResult<()> {
        let n = bands.len();
        let cx = f64::from(settings.spectrum_x) / 100.0 * w;
        let cy = f64::from(settings.spectrum_y) / 100.0 * h;
        let sens = f64::from(settings.sensitivity);
        let scale = f64::from(settings.spectrum_scale);

        // Vertical gradient in surface space: start color at the bottom edge.
        let grad = self.linear_gradient(settings.color_end, settings.color_start)?;
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(grad);

        match settings.style {
            SpectrumStyle::Bar | SpectrumStyle::RoundBar => {
                let gap = 2.0 * hs;
                let slot = w / n as f64;
                let bar_w = (slot - gap).max(1.5);
                let round = settings.style == SpectrumStyle::RoundBar;

                for (i, v) in bands.iter().enumerate() {
                    // 2px floor keeps zero-energy bars visible as stubs.
                    let bar_h = f64::from(*v) * sens * 0.4 * scale * hs + 2.0;
                    let x = i as f64 * slot + gap / 2.0;
                    if round {
                        ctx.fill_path(&rounded_bar_path(x, cy, bar_w, bar_h));
                    } else {
                        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(x, cy - bar_h, x + bar_w, cy));
                    }
                }
            }
            SpectrumStyle::Circle => {
                let base_radius = 180.0 * scale * hs;
                let total: f64 = bands.iter().map(|v| f64::from(*v)).sum();
                // Whole-ring breathing on top of the per-band radial bars.
                let pulse = 1.0 + total / (n as f64 * 255.0) * 0.3;
                let step = 2.0 * PI / n as f64;

                for (i, v) in bands.iter().enumerate() {
                    let bar_h = (f64::from(*v) * sens * 0.22 * hs).max(2.0);
                    let tr = vello_cpu::kurbo::Affine::translate((cx, cy))
                        * vello_cpu::kurbo::Affine::scale(pulse)
                        * vello_cpu::kurbo::Affine::rotate(step * (i + 1) as f64);
                    ctx.set_transform(tr);
                    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                        -1.5 * hs,
                        base_radius,
                        1.5 * hs,
                        base_radius + bar_h,
                    ));
                }
                ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            }
            SpectrumStyle::Wave => {
                let sw = w / (n as f64 - 1.0);
                let mut path = kurbo::BezPath::new();
                for (i, v) in bands.iter().enumerate() {
                    let y = cy - f64::from(*v) / 255.0 * 140.0 * sens * scale * hs;
                    let x = i as f64 * sw;
                    if i == 0 {
                        path.move_to((x, y));
                    } else {
                        path.line_to((x, y));
                    }
                }
                // The backend only fills, so expand the stroke first.
                let style = kurbo::Stroke::new(4.0 * hs)
                    .with_join(kurbo::Join::Round)
                    .with_caps(kurbo::Cap::Round);
                let outline = kurbo::stroke(path, &style, &kurbo::StrokeOpts::default(), 0.1);
                ctx.fill_path(&bezpath_to_cpu(&outline));
            }
        }
        Ok(())
    }

    fn linear_gradient(&mut self, top: Rgba8, bottom: Rgba8) -> StudioResult<vello_cpu::Image> {
        let key = LinearGradientKey {
            top: top.to_premul(),
            bottom: bottom.to_premul(),
        };
        if let Some(img) = self.linear_gradients.get(&key).cloned() {
            return Ok(img);
        }

        let (w, h) = (self.canvas.width, self.canvas.height);
        let mut bytes = vec![0u8; (w as usize).saturating_mul(h as usize).saturating_mul(4)];
        let h1 = (h.max(1) - 1) as f32;
        for y in 0..h {
            let t = if h1 <= 0.0 { 0.0 } else { (y as f32) / h1 };
            let c = lerp_premul(key.top, key.bottom, t);
            for x in 0..w {
                let idx = ((y as usize) * (w as usize) + (x as usize)) * 4;
                bytes[idx..idx + 4].copy_from_slice(&c);
            }
        }
        let img = rgba_premul_to_image(&bytes, w, h)?;
        self.linear_gradients.insert(key, img.clone());
        Ok(img)
    }

    fn radial_gradient(
        &mut self,
        inner: Rgba8,
        outer: Rgba8,
        r0: f64,
        r1: f64,
    ) -> StudioResult<vello_cpu::Image> {
        let key = RadialGradientKey {
            inner: inner.to_premul(),
            outer: outer.to_premul(),
            r0: r0.max(0.0) as u32,
            r1: r1.max(0.0) as u32,
        };
        if let Some(img) = self.radial_gradients.get(&key).cloned() {
            return Ok(img);
        }

        let (w, h) = (self.canvas.width, self.canvas.height);
        let (cx, cy) = (f64::from(w) / 2.0, f64::from(h) / 2.0);
        let span = (f64::from(key.r1) - f64::from(key.r0)).max(1.0);
        let mut bytes = vec![0u8; (w as usize).saturating_mul(h as usize).saturating_mul(4)];
        for y in 0..h {
            for x in 0..w {
                let dx = f64::from(x) + 0.5 - cx;
                let dy = f64::from(y) + 0.5 - cy;
                let d = (dx * dx + dy * dy).sqrt();
                let t = ((d - f64::from(key.r0)) / span).clamp(0.0, 1.0) as f32;
                let c = lerp_premul(key.inner, key.outer, t);
                let idx = ((y as usize) * (w as usize) + (x as usize)) * 4;
                bytes[idx..idx + 4].copy_from_slice(&c);
            }
        }
        let img = rgba_premul_to_image(&bytes, w, h)?;
        self.radial_gradients.insert(key, img.clone());
        Ok(img)
    }
}

fn rounded_bar_path(x: f64, cy: f64, bar_w: f64, bar_h: f64) -> vello_cpu::kurbo::BezPath {
    // Top two corners rounded with radius = half the bar width.
    let radius = bar_w / 2.0;
    let top = cy - bar_h;
    let mut p = vello_cpu::kurbo::BezPath::new();
    p.move_to((x + radius, top));
    p.line_to((x + bar_w - radius, top));
    p.quad_to((x + bar_w, top), (x + bar_w, top + radius));
    p.line_to((x + bar_w, cy));
    p.line_to((x, cy));
    p.line_to((x, top + radius));
    p.quad_to((x, top), (x + radius, top));
    p.close_path();
    p
}

fn color_paint(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn lerp_premul(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    let lerp = |x: u8, y: u8| -> u8 {
        let xf = x as f32;
        let yf = y as f32;
        (xf + (yf - xf) * t).round().clamp(0.0, 255.0) as u8
    };
    [
        lerp(a[0], b[0]),
        lerp(a[1], b[1]),
        lerp(a[2], b[2]),
        lerp(a[3], b[3]),
    ]
}

fn decode_image_paint(bytes: &[u8]) -> StudioResult<ImagePaint> {
    use anyhow::Context as _;

    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut premul);

    Ok(ImagePaint {
        paint: rgba_premul_to_image(&premul, width, height)?,
        w: width,
        h: height,
    })
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> StudioResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| StudioError::validation("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| StudioError::validation("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(StudioError::validation("pixmap byte len mismatch"));
    }
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (width as usize) * (height as usize),
    );
    for px in bytes.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, true,
    ))
}

fn rgba_premul_to_image(
    bytes_premul: &[u8],
    width: u32,
    height: u32,
) -> StudioResult<vello_cpu::Image> {
    let pixmap = pixmap_from_premul_bytes(bytes_premul, width, height)?;
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_canvas() -> Canvas {
        Canvas {
            width: 192,
            height: 108,
        }
    }

    fn small_settings() -> VisualSettings {
        VisualSettings {
            band_count: 16,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_degenerate_canvas() {
        assert!(
            FrameRenderer::new(Canvas {
                width: 0,
                height: 108
            })
            .is_err()
        );
        assert!(
            FrameRenderer::new(Canvas {
                width: 100_000,
                height: 108
            })
            .is_err()
        );
    }

    #[test]
    fn renders_expected_dimensions_and_opaque_pixels() {
        let mut r = FrameRenderer::new(small_canvas()).unwrap();
        let frame = r.render(&small_settings(), None).unwrap();
        assert_eq!(frame.width, 192);
        assert_eq!(frame.height, 108);
        assert_eq!(frame.data.len(), 192 * 108 * 4);
        assert!(frame.premultiplied);
        // Background fill makes every pixel opaque.
        assert!(frame.data.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn frame_counter_is_monotonic() {
        let mut r = FrameRenderer::new(small_canvas()).unwrap();
        assert_eq!(r.frame_count(), 0);
        let _ = r.render(&small_settings(), None).unwrap();
        let _ = r.render(&small_settings(), None).unwrap();
        assert_eq!(r.frame_count(), 2);
    }

    #[test]
    fn idle_frames_vary_over_time() {
        let mut r = FrameRenderer::new(small_canvas()).unwrap();
        let settings = VisualSettings {
            particles_enabled: false,
            ..small_settings()
        };
        let a = r.render(&settings, None).unwrap();
        for _ in 0..20 {
            let _ = r.render(&settings, None).unwrap();
        }
        let b = r.render(&settings, None).unwrap();
        assert_ne!(a.data, b.data, "idle animation must not be static");
    }

    #[test]
    fn every_style_renders() {
        for style in [
            SpectrumStyle::Bar,
            SpectrumStyle::RoundBar,
            SpectrumStyle::Wave,
            SpectrumStyle::Circle,
        ] {
            let mut r = FrameRenderer::new(small_canvas()).unwrap();
            let settings = VisualSettings {
                style,
                ..small_settings()
            };
            let mags = vec![200u8; 1024];
            let frame = r
                .render(
                    &settings,
                    Some(AudioSnapshot {
                        magnitudes: &mags,
                        sample_rate: 44_100,
                    }),
                )
                .unwrap();
            assert_eq!(frame.data.len(), 192 * 108 * 4);
        }
    }

    #[test]
    fn live_bands_change_the_picture() {
        let settings = VisualSettings {
            particles_enabled: false,
            ..small_settings()
        };

        let mut quiet = FrameRenderer::new(small_canvas()).unwrap();
        let silent = vec![0u8; 1024];
        let a = quiet
            .render(
                &settings,
                Some(AudioSnapshot {
                    magnitudes: &silent,
                    sample_rate: 44_100,
                }),
            )
            .unwrap();

        let mut loud = FrameRenderer::new(small_canvas()).unwrap();
        let full = vec![255u8; 1024];
        let b = loud
            .render(
                &settings,
                Some(AudioSnapshot {
                    magnitudes: &full,
                    sample_rate: 44_100,
                }),
            )
            .unwrap();

        assert_ne!(a.data, b.data);
    }

    #[test]
    fn invalid_settings_fail_before_drawing() {
        let mut r = FrameRenderer::new(small_canvas()).unwrap();
        let bad = VisualSettings {
            band_count: 1,
            ..Default::default()
        };
        assert!(r.render(&bad, None).is_err());
        assert_eq!(r.frame_count(), 0, "failed render must not advance time");
    }

    #[test]
    fn background_image_replaces_gradient_fallback() {
        let mut with_image = FrameRenderer::new(small_canvas()).unwrap();
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([255, 0, 0, 255]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        with_image.set_background_image(Some(&png)).unwrap();

        let settings = VisualSettings {
            particles_enabled: false,
            bg_filter: BgFilter::None,
            ..small_settings()
        };
        let a = with_image.render(&settings, None).unwrap();

        let mut plain = FrameRenderer::new(small_canvas()).unwrap();
        let b = plain.render(&settings, None).unwrap();
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn bogus_image_bytes_error() {
        let mut r = FrameRenderer::new(small_canvas()).unwrap();
        assert!(r.set_background_image(Some(b"not an image")).is_err());
        assert!(r.set_logo_image(Some(b"not an image")).is_err());
    }
}
