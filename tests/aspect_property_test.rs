mod common;

use base64::Engine;
use common::png_bytes;
use proptest::prelude::*;
use slide_image_enhancer::enhancer::{
    AspectRatio, CropStrategy, EnhancementConfig, ImageEnhancer,
};

fn data_url(width: u32, height: u32) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(width, height));
    format!("data:image/png;base64,{}", encoded)
}

fn enhance_dims(config: EnhancementConfig, width: u32, height: u32) -> (u32, u32) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build runtime failed");
    let enhancer = ImageEnhancer::new(config).expect("enhancer init failed");

    let image = runtime
        .block_on(enhancer.enhance(&data_url(width, height)))
        .expect("enhance failed");
    (image.metadata.width, image.metadata.height)
}

fn strategy() -> impl Strategy<Value = CropStrategy> {
    prop_oneof![
        Just(CropStrategy::Center),
        Just(CropStrategy::Smart),
        Just(CropStrategy::Fill),
        Just(CropStrategy::Fit),
    ]
}

fn ratio() -> impl Strategy<Value = AspectRatio> {
    prop_oneof![
        Just(AspectRatio::Widescreen),
        Just(AspectRatio::Standard),
        Just(AspectRatio::Square),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn output_ratio_conforms_to_target(
        width in 8u32..240,
        height in 8u32..240,
        target_width in 40u32..200,
        crop in strategy(),
        aspect in ratio(),
    ) {
        let config = EnhancementConfig {
            target_width,
            target_height: target_width / 2,
            aspect_ratio: aspect,
            crop_strategy: crop,
            enable_caching: false,
            ..Default::default()
        };
        let expected = aspect.ratio().expect("fixed ratio");

        let (out_w, out_h) = enhance_dims(config, width, height);
        let actual = out_w as f64 / out_h as f64;

        prop_assert!(
            (actual - expected).abs() / expected <= 0.01,
            "{}x{} -> {}x{} ratio {:.4} expected {:.4}",
            width, height, out_w, out_h, actual, expected
        );
    }

    #[test]
    fn auto_ratio_without_upscale_keeps_dimensions(
        width in 8u32..240,
        height in 8u32..240,
        crop in strategy(),
    ) {
        let config = EnhancementConfig {
            aspect_ratio: AspectRatio::Auto,
            upscale_enabled: false,
            crop_strategy: crop,
            enable_caching: false,
            ..Default::default()
        };

        prop_assert_eq!(enhance_dims(config, width, height), (width, height));
    }
}
