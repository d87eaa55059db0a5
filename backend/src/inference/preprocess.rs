use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;

use super::model::InferenceError;

/// Grey fill used by YOLO exports for letterbox borders.
const LETTERBOX_PAD: f32 = 114.0 / 255.0;

/// Row layout: [cx, cy, w, h, conf, ...landmarks]
const MIN_DETECTION_FEATURES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Scales the image to fit a `size`x`size` square, centred on grey padding, as NCHW RGB in 0..1.
pub fn letterbox(image: &DynamicImage, size: u32) -> (Array4<f32>, Letterbox) {
    let (width, height) = image.dimensions();
    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let resized = image::imageops::resize(&image.to_rgb8(), new_w, new_h, FilterType::Triangle);

    let side = size as usize;
    let mut tensor = Array4::<f32>::from_elem((1, 3, side, side), LETTERBOX_PAD);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (x + pad_x) as usize;
        let ty = (y + pad_y) as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = pixel[c] as f32 / 255.0;
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// Picks the most confident detection at or above `threshold` from a YOLO-style output,
/// mapped back into source image coordinates and clipped to its bounds.
///
/// Accepts both `[1, features, detections]` and `[1, detections, features]` layouts.
pub fn best_face(
    dims: &[usize],
    data: &[f32],
    letterbox: &Letterbox,
    threshold: f32,
    image_size: (u32, u32),
) -> Result<Option<FaceBox>, InferenceError> {
    if dims.len() != 3 {
        return Err(InferenceError::UnexpectedOutput(format!(
            "face detector output shape {:?}",
            dims
        )));
    }
    let transposed = dims[1] < dims[2];
    let (num_dets, num_feats) = if transposed {
        (dims[2], dims[1])
    } else {
        (dims[1], dims[2])
    };
    if num_feats < MIN_DETECTION_FEATURES || data.len() < num_dets * num_feats {
        return Err(InferenceError::UnexpectedOutput(format!(
            "face detector output shape {:?} with {} values",
            dims,
            data.len()
        )));
    }

    let value = |det: usize, feat: usize| {
        if transposed {
            data[feat * num_dets + det]
        } else {
            data[det * num_feats + feat]
        }
    };

    let mut best: Option<(usize, f32)> = None;
    for det in 0..num_dets {
        let conf = value(det, 4);
        if conf < threshold {
            continue;
        }
        if best.is_none_or(|(_, c)| conf > c) {
            best = Some((det, conf));
        }
    }

    let Some((det, confidence)) = best else {
        return Ok(None);
    };

    let (img_w, img_h) = (image_size.0 as f32, image_size.1 as f32);
    let (cx, cy, w, h) = (value(det, 0), value(det, 1), value(det, 2), value(det, 3));
    let x1 = (((cx - w / 2.0) - letterbox.pad_x) / letterbox.scale).clamp(0.0, img_w);
    let y1 = (((cy - h / 2.0) - letterbox.pad_y) / letterbox.scale).clamp(0.0, img_h);
    let x2 = (((cx + w / 2.0) - letterbox.pad_x) / letterbox.scale).clamp(0.0, img_w);
    let y2 = (((cy + h / 2.0) - letterbox.pad_y) / letterbox.scale).clamp(0.0, img_h);

    if x2 - x1 < 1.0 || y2 - y1 < 1.0 {
        return Ok(None);
    }

    Ok(Some(FaceBox {
        x: x1,
        y: y1,
        width: x2 - x1,
        height: y2 - y1,
        confidence,
    }))
}

pub fn crop_face(image: &DynamicImage, face: &FaceBox) -> DynamicImage {
    let (width, height) = image.dimensions();
    let x = (face.x.floor() as u32).min(width.saturating_sub(1));
    let y = (face.y.floor() as u32).min(height.saturating_sub(1));
    let w = (face.width.round() as u32).clamp(1, width - x);
    let h = (face.height.round() as u32).clamp(1, height - y);
    image.crop_imm(x, y, w, h)
}

/// Builds the expression network input: `[1, 1, s, s]` luma or `[1, 3, s, s]` RGB.
pub fn expression_tensor(face: &DynamicImage, size: u32, grayscale: bool, pixel_scale: f32) -> Array4<f32> {
    let resized = face.resize_exact(size, size, FilterType::Triangle);
    let side = size as usize;

    if grayscale {
        let luma = resized.to_luma8();
        let mut tensor = Array4::<f32>::zeros((1, 1, side, side));
        for (x, y, pixel) in luma.enumerate_pixels() {
            tensor[[0, 0, y as usize, x as usize]] = pixel[0] as f32 * pixel_scale;
        }
        tensor
    } else {
        let rgb = resized.to_rgb8();
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 * pixel_scale;
            }
        }
        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([value, value, value])))
    }

    #[test]
    fn letterbox_pads_short_side() {
        let (tensor, info) = letterbox(&solid(320, 240, 255), 640);
        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(info.scale, 2.0);
        assert_relative_eq!(info.pad_x, 0.0);
        assert_relative_eq!(info.pad_y, 80.0);
        assert_relative_eq!(tensor[[0, 0, 0, 320]], LETTERBOX_PAD);
        assert_relative_eq!(tensor[[0, 1, 320, 320]], 1.0, epsilon = 0.01);
    }

    #[test]
    fn best_face_reads_transposed_layout() {
        // 5 features x 6 detections, feature-major.
        let data = vec![
            10.0, 50.0, 90.0, 0.0, 0.0, 0.0, // cx
            10.0, 50.0, 90.0, 0.0, 0.0, 0.0, // cy
            4.0, 20.0, 8.0, 0.0, 0.0, 0.0, // w
            4.0, 20.0, 8.0, 0.0, 0.0, 0.0, // h
            0.3, 0.9, 0.6, 0.0, 0.0, 0.0, // conf
        ];
        let info = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let face = best_face(&[1, 5, 6], &data, &info, 0.5, (100, 100))
            .unwrap()
            .unwrap();
        assert_relative_eq!(face.confidence, 0.9);
        assert_relative_eq!(face.x, 40.0);
        assert_relative_eq!(face.width, 20.0);
    }

    #[test]
    fn best_face_reads_row_layout_and_undoes_letterbox() {
        // 6 detections x 5 features, detection-major.
        let mut data = vec![0.0; 30];
        data[5..10].copy_from_slice(&[100.0, 180.0, 40.0, 40.0, 0.8]);
        let info = Letterbox {
            scale: 2.0,
            pad_x: 0.0,
            pad_y: 80.0,
        };
        let face = best_face(&[1, 6, 5], &data, &info, 0.5, (320, 240))
            .unwrap()
            .unwrap();
        assert_relative_eq!(face.x, 40.0);
        assert_relative_eq!(face.y, 40.0);
        assert_relative_eq!(face.width, 20.0);
        assert_relative_eq!(face.height, 20.0);
    }

    #[test]
    fn best_face_below_threshold_is_none() {
        let mut data = vec![0.0; 30];
        data[..5].copy_from_slice(&[10.0, 10.0, 4.0, 4.0, 0.2]);
        let info = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        assert!(best_face(&[1, 6, 5], &data, &info, 0.5, (100, 100)).unwrap().is_none());
    }

    #[test]
    fn best_face_rejects_bad_shape() {
        let info = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        assert!(best_face(&[1, 5], &[0.0; 5], &info, 0.5, (10, 10)).is_err());
        assert!(best_face(&[1, 3, 2], &[0.0; 6], &info, 0.5, (10, 10)).is_err());
    }

    #[test]
    fn crop_face_stays_inside_image() {
        let image = solid(50, 40, 0);
        let face = FaceBox {
            x: 45.0,
            y: 35.0,
            width: 30.0,
            height: 30.0,
            confidence: 1.0,
        };
        let crop = crop_face(&image, &face);
        assert_eq!(crop.dimensions(), (5, 5));
    }

    #[test]
    fn expression_tensor_shapes() {
        let face = solid(30, 30, 200);
        let gray = expression_tensor(&face, 64, true, 1.0);
        assert_eq!(gray.shape(), &[1, 1, 64, 64]);
        assert_relative_eq!(gray[[0, 0, 10, 10]], 200.0, epsilon = 1.0);

        let rgb = expression_tensor(&face, 112, false, 1.0 / 255.0);
        assert_eq!(rgb.shape(), &[1, 3, 112, 112]);
        assert_relative_eq!(rgb[[0, 2, 5, 5]], 200.0 / 255.0, epsilon = 0.01);
    }
}
