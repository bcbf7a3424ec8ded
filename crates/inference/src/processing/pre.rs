use crate::config::DEFAULT_INPUT_SIZE;
use crate::processing::post::TransformParams;
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::RgbImage;
use ndarray::{Array, IxDyn};

const LETTERBOX_COLOR: u8 = 114;

/// Network-ready tensor plus what is needed to map boxes back onto the source image.
pub struct Preprocessed {
    pub input: Array<f32, IxDyn>,
    pub transform: TransformParams,
}

/// Letterboxes an RGB image into a fixed square-ish input and converts it to a
/// `[1, 3, H, W]` tensor scaled to `[0, 1]`.
///
/// Stateless so a single instance can be shared by concurrent requests.
#[derive(Debug, Clone)]
pub struct PreProcessor {
    pub input_size: (u32, u32),
}

impl PreProcessor {
    pub fn new(input_size: (u32, u32)) -> Self {
        Self { input_size }
    }

    pub fn preprocess(&self, image: &RgbImage) -> anyhow::Result<Preprocessed> {
        let _s = span!("preprocess_image");

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            anyhow::bail!("Image has no pixels ({}x{})", width, height);
        }

        tracing::trace!(width, height, "Preprocessing image dimensions");

        let (letterboxed, scale, offset_x, offset_y) = self.resize_and_letterbox(image)?;
        let input = self.normalize(&letterboxed)?;

        Ok(Preprocessed {
            input,
            transform: TransformParams {
                orig_width: width,
                orig_height: height,
                input_width: self.input_size.0,
                input_height: self.input_size.1,
                scale,
                offset_x,
                offset_y,
            },
        })
    }

    fn resize_and_letterbox(&self, image: &RgbImage) -> anyhow::Result<(Vec<u8>, f32, f32, f32)> {
        let _s = span!("resize_and_letterbox");

        let (width, height) = image.dimensions();
        let (input_width, input_height) = self.input_size;

        let scale = (input_width as f32 / width as f32).min(input_height as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).clamp(1, input_width);
        let new_height = ((height as f32 * scale) as u32).clamp(1, input_height);

        let offset_x = (input_width - new_width) / 2;
        let offset_y = (input_height - new_height) / 2;

        let src = ImageRef::new(width, height, image.as_raw(), PixelType::U8x3)?;
        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        let mut letterboxed = vec![LETTERBOX_COLOR; (input_width * input_height * 3) as usize];

        let resized_data = resized.buffer();
        let row_bytes = (new_width * 3) as usize;
        let stride = input_width * 3;

        for y in 0..new_height {
            let src_row = y as usize * row_bytes;
            let dst_row = ((y + offset_y) * stride + offset_x * 3) as usize;

            letterboxed[dst_row..dst_row + row_bytes]
                .copy_from_slice(&resized_data[src_row..src_row + row_bytes]);
        }

        Ok((letterboxed, scale, offset_x as f32, offset_y as f32))
    }

    /// HWC u8 to CHW f32 in `[0, 1]`.
    fn normalize(&self, letterboxed: &[u8]) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span!("normalize");

        let width = self.input_size.0 as usize;
        let height = self.input_size.1 as usize;
        let spatial = width * height;

        let mut output = vec![0.0f32; 3 * spatial];

        for (i, px) in letterboxed.chunks_exact(3).enumerate() {
            output[i] = px[0] as f32 / 255.0;
            output[i + spatial] = px[1] as f32 / 255.0;
            output[i + 2 * spatial] = px[2] as f32 / 255.0;
        }

        Ok(Array::from_shape_vec(IxDyn(&[1, 3, height, width]), output)?)
    }
}

impl Default for PreProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE)
    }
}
