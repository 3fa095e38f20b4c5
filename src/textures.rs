use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Decoded pixel buffer, RGBA8.
pub struct CpuTexture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Opaque GPU texture identifier. Handed to draw code instead of raw
/// resource references; an absent handle means "skip this draw".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuHandle(u32);

impl GpuHandle {
    pub fn raw(self) -> u32 {
        self.0
    }
}

struct GpuTexture {
    handle: GpuHandle,
    view: wgpu::TextureView,
    size: (u32, u32),
}

/// Process-wide texture cache split into a CPU stage (decoded on worker
/// threads) and a GPU stage (uploaded in one batch on the thread owning
/// the rendering context). A path moves unknown -> CPU-resident ->
/// GPU-resident and never back until shutdown.
pub struct TextureStage {
    cpu: Arc<Mutex<HashMap<PathBuf, CpuTexture>>>,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
    gpu: Mutex<HashMap<PathBuf, GpuTexture>>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    sampler: Option<wgpu::Sampler>,
    next_handle: u32,
    decode_attempts: Arc<AtomicUsize>,
}

impl Default for TextureStage {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureStage {
    pub fn new() -> Self {
        Self {
            cpu: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            gpu: Mutex::new(HashMap::new()),
            device: None,
            queue: None,
            sampler: None,
            next_handle: 1,
            decode_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Installs the rendering device. Required before `upload_all_pending`;
    /// also builds the fixed pixel-art sampler (clamp to edge, nearest).
    pub fn set_device(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.device = Some(device.clone());
        self.queue = Some(queue.clone());
        self.sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Tile Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        }));
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    pub fn sampler(&self) -> Option<&wgpu::Sampler> {
        self.sampler.as_ref()
    }

    /// Kicks off a concurrent decode for `path`. Idempotent: a path that
    /// is already CPU-resident or currently decoding is not decoded again.
    /// Decode failure logs, leaves the path absent, and is non-fatal.
    /// Returns the worker handle so callers can join all loads before the
    /// upload pass.
    pub fn request_load(&self, path: impl Into<PathBuf>) -> JoinHandle<bool> {
        let path = path.into();
        let cpu = Arc::clone(&self.cpu);
        let in_flight = Arc::clone(&self.in_flight);
        let decode_attempts = Arc::clone(&self.decode_attempts);
        thread::spawn(move || {
            // Admission: check residency while holding the in-flight set
            // so exactly one worker decodes a given path.
            {
                let mut pending = in_flight.lock().expect("texture in-flight set poisoned");
                if pending.contains(&path) {
                    return true;
                }
                if cpu.lock().expect("cpu texture map poisoned").contains_key(&path) {
                    return true;
                }
                pending.insert(path.clone());
            }

            decode_attempts.fetch_add(1, Ordering::SeqCst);
            let decoded = decode_rgba8(&path);

            let mut pending = in_flight.lock().expect("texture in-flight set poisoned");
            match decoded {
                Ok(texture) => {
                    eprintln!(
                        "[assets] loaded texture (cpu): {} ({}x{})",
                        path.display(),
                        texture.width,
                        texture.height
                    );
                    cpu.lock().expect("cpu texture map poisoned").insert(path.clone(), texture);
                    pending.remove(&path);
                    true
                }
                Err(err) => {
                    eprintln!("[assets] failed to load texture {}: {err}", path.display());
                    pending.remove(&path);
                    false
                }
            }
        })
    }

    pub fn is_cpu_resident(&self, path: impl AsRef<Path>) -> bool {
        self.cpu.lock().expect("cpu texture map poisoned").contains_key(path.as_ref())
    }

    pub fn cpu_dimensions(&self, path: impl AsRef<Path>) -> Option<(u32, u32)> {
        self.cpu
            .lock()
            .expect("cpu texture map poisoned")
            .get(path.as_ref())
            .map(|texture| (texture.width, texture.height))
    }

    pub fn cpu_resident_count(&self) -> usize {
        self.cpu.lock().expect("cpu texture map poisoned").len()
    }

    /// Number of decode attempts performed since construction. One per
    /// path no matter how many concurrent requests raced for it.
    pub fn decode_attempts(&self) -> usize {
        self.decode_attempts.load(Ordering::SeqCst)
    }

    /// Batch-uploads every CPU-resident texture that has no GPU record
    /// yet. Must run on the thread owning the rendering context; this is
    /// the only place GPU texture objects are created. A full mip chain
    /// is generated (CPU box filter) and written level by level. Returns
    /// the number of textures uploaded.
    pub fn upload_all_pending(&mut self) -> Result<usize> {
        let device = self
            .device
            .clone()
            .ok_or_else(|| anyhow!("GPU device not installed; call set_device before uploading"))?;
        let queue = self
            .queue
            .clone()
            .ok_or_else(|| anyhow!("GPU queue not installed; call set_device before uploading"))?;

        let cpu_map = self.cpu.lock().expect("cpu texture map poisoned");
        let mut gpu_map = self.gpu.lock().expect("gpu texture map poisoned");
        let mut uploaded = 0usize;

        for (path, texture) in cpu_map.iter() {
            if gpu_map.contains_key(path) {
                continue;
            }
            if texture.pixels.is_empty() || texture.width == 0 || texture.height == 0 {
                continue;
            }
            let mip_count = mip_level_count(texture.width, texture.height);
            let gpu_texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Tile Texture"),
                size: wgpu::Extent3d {
                    width: texture.width,
                    height: texture.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: mip_count,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });

            let mut level_pixels = texture.pixels.clone();
            let (mut level_w, mut level_h) = (texture.width, texture.height);
            for level in 0..mip_count {
                queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &gpu_texture,
                        mip_level: level,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    &level_pixels,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(4 * level_w),
                        rows_per_image: Some(level_h),
                    },
                    wgpu::Extent3d { width: level_w, height: level_h, depth_or_array_layers: 1 },
                );
                if level + 1 < mip_count {
                    let (next_w, next_h, next_pixels) =
                        downsample_rgba(&level_pixels, level_w, level_h);
                    level_pixels = next_pixels;
                    level_w = next_w;
                    level_h = next_h;
                }
            }

            let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
            let handle = GpuHandle(self.next_handle);
            self.next_handle += 1;
            gpu_map.insert(
                path.clone(),
                GpuTexture { handle, view, size: (texture.width, texture.height) },
            );
            uploaded += 1;
            eprintln!("[assets] uploaded to gpu: {} [handle {}]", path.display(), handle.raw());
        }
        Ok(uploaded)
    }

    /// O(1) lookup; None until the path has been through an upload pass.
    pub fn gpu_handle(&self, path: impl AsRef<Path>) -> Option<GpuHandle> {
        self.gpu
            .lock()
            .expect("gpu texture map poisoned")
            .get(path.as_ref())
            .map(|texture| texture.handle)
    }

    pub fn gpu_view(&self, path: impl AsRef<Path>) -> Option<wgpu::TextureView> {
        self.gpu
            .lock()
            .expect("gpu texture map poisoned")
            .get(path.as_ref())
            .map(|texture| texture.view.clone())
    }

    pub fn gpu_size(&self, path: impl AsRef<Path>) -> Option<(u32, u32)> {
        self.gpu
            .lock()
            .expect("gpu texture map poisoned")
            .get(path.as_ref())
            .map(|texture| texture.size)
    }

    pub fn gpu_resident_count(&self) -> usize {
        self.gpu.lock().expect("gpu texture map poisoned").len()
    }

    /// Frees decoded pixel memory for every GPU-resident entry. The CPU
    /// record stays (residency is monotonic); only its buffer is dropped.
    /// Safe to call repeatedly.
    pub fn release_cpu_buffers(&self) {
        let mut cpu_map = self.cpu.lock().expect("cpu texture map poisoned");
        let gpu_map = self.gpu.lock().expect("gpu texture map poisoned");
        let mut released = 0usize;
        for (path, texture) in cpu_map.iter_mut() {
            if gpu_map.contains_key(path) && !texture.pixels.is_empty() {
                texture.pixels = Vec::new();
                released += 1;
            }
        }
        if released > 0 {
            eprintln!("[assets] released cpu pixel buffers for {released} textures");
        }
    }

    /// Drops every record and GPU resource. Must be the last call before
    /// the rendering context is destroyed.
    pub fn shutdown(&mut self) {
        self.gpu.lock().expect("gpu texture map poisoned").clear();
        self.cpu.lock().expect("cpu texture map poisoned").clear();
        self.in_flight.lock().expect("texture in-flight set poisoned").clear();
        self.sampler = None;
        self.queue = None;
        self.device = None;
    }
}

fn decode_rgba8(path: &Path) -> Result<CpuTexture> {
    let bytes = std::fs::read(path)?;
    let image = image::load_from_memory(&bytes)?.to_rgba8();
    let (width, height) = image.dimensions();
    Ok(CpuTexture { width, height, pixels: image.into_raw() })
}

/// Mip levels for a full chain down to 1x1.
fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Halves an RGBA8 image with a 2x2 box filter; odd edges clamp to the
/// last row/column.
fn downsample_rgba(pixels: &[u8], width: u32, height: u32) -> (u32, u32, Vec<u8>) {
    let next_w = (width / 2).max(1);
    let next_h = (height / 2).max(1);
    let mut out = Vec::with_capacity((next_w * next_h * 4) as usize);
    for y in 0..next_h {
        for x in 0..next_w {
            let x0 = (x * 2).min(width - 1);
            let x1 = (x * 2 + 1).min(width - 1);
            let y0 = (y * 2).min(height - 1);
            let y1 = (y * 2 + 1).min(height - 1);
            for channel in 0..4 {
                let sum = sample(pixels, width, x0, y0, channel)
                    + sample(pixels, width, x1, y0, channel)
                    + sample(pixels, width, x0, y1, channel)
                    + sample(pixels, width, x1, y1, channel);
                out.push((sum / 4) as u8);
            }
        }
    }
    (next_w, next_h, out)
}

fn sample(pixels: &[u8], width: u32, x: u32, y: u32, channel: u32) -> u32 {
    pixels[((y * width + x) * 4 + channel) as usize] as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_covers_down_to_one_pixel() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(16, 16), 5);
        assert_eq!(mip_level_count(256, 64), 9);
        assert_eq!(mip_level_count(100, 30), 7);
    }

    #[test]
    fn downsample_averages_quads() {
        // 2x2 checkerboard: white, black / black, white -> one grey pixel.
        let pixels = vec![
            255, 255, 255, 255, 0, 0, 0, 255, //
            0, 0, 0, 255, 255, 255, 255, 255,
        ];
        let (w, h, out) = downsample_rgba(&pixels, 2, 2);
        assert_eq!((w, h), (1, 1));
        assert_eq!(out, vec![127, 127, 127, 255]);
    }

    #[test]
    fn downsample_clamps_odd_dimensions() {
        let pixels: Vec<u8> = [10u8, 10, 10, 255].repeat(3);
        let (w, h, out) = downsample_rgba(&pixels, 3, 1);
        assert_eq!((w, h), (1, 1));
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], 10);
    }

    #[test]
    fn upload_without_device_fails() {
        let mut stage = TextureStage::new();
        let err = stage.upload_all_pending().unwrap_err();
        assert!(err.to_string().contains("set_device"));
    }
}
