//! 手書き数字画像の正規化パイプライン
//!
//! 任意サイズのビットマップを 28x28 の標準テンソルに変換します。
//! 各段は純粋関数で、次の順序で実行されます:
//!
//! 1. グレースケール化
//! 2. ガウシアンぼかし（ノイズ除去）
//! 3. 28x28 へのバイキュービック縮小
//! 4. 大津の二値化
//! 5. モルフォロジー・クロージング
//! 6. 重心によるセンタリング
//! 7. 統計的正規化（反転 + 標準化）

pub mod augmentation;
pub mod blur;
pub mod centering;
pub mod grayscale;
pub mod morphology;
pub mod pipeline;
pub mod tensor;
pub mod threshold;

pub use augmentation::{AugmentationSettings, Augmenter};
pub use pipeline::ImageNormalizer;
pub use tensor::{standardize, CanonicalTensor, CANVAS_SIZE, INPUT_SIZE};
