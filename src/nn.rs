//! Neural Network inference.
//!
//! The landmark network is executed on the CPU with [`tract_onnx`].

use std::{ops::RangeInclusive, path::Path, sync::Arc};

use anyhow::{bail, Context};
use tract_onnx::prelude::{
    tract_ndarray::Array4, tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue,
    Tensor as TractTensor, TypedFact, TypedOp,
};

use crate::{
    image::{Color, Image, Rect},
    resolution::Resolution,
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) that operates on image data.
///
/// This is a cheaply [`Clone`]able handle to the underlying network.
#[derive(Clone)]
pub struct Cnn {
    model: Arc<Model>,
    shape: CnnInputShape,
    input_res: Resolution,
    color_mapper: ColorMapper,
}

impl Cnn {
    /// Loads and optimizes an ONNX network from the filesystem.
    ///
    /// The network must have exactly one input with a shape that matches the given
    /// [`CnnInputShape`].
    pub fn load<P: AsRef<Path>>(
        path: P,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref(), shape, color_mapper)
    }

    fn load_impl(
        path: &Path,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let graph = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("failed to read network from '{}'", path.display()))?
            .into_optimized()?;
        let model = SimplePlan::new(graph)?;

        let input_res = Self::get_input_res(&model, shape)?;
        log::debug!(
            "loaded network '{}' with {:?} input of {}",
            path.display(),
            shape,
            input_res
        );

        Ok(Self {
            model: Arc::new(model),
            shape,
            input_res,
            color_mapper,
        })
    }

    fn get_input_res(model: &Model, shape: CnnInputShape) -> anyhow::Result<Resolution> {
        let graph = model.model();
        if graph.inputs.len() != 1 {
            bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                graph.inputs.len(),
            );
        }

        let fact = graph.input_fact(0)?;
        let Some(tensor_shape) = fact.shape.as_concrete() else {
            bail!("CNN network input has a symbolic shape: {:?}", fact.shape);
        };

        let (w, h) = match (shape, tensor_shape) {
            (CnnInputShape::NCHW, [1, 3, h, w]) | (CnnInputShape::NHWC, [1, h, w, 3]) => (*w, *h),
            _ => {
                bail!(
                    "invalid model input shape for {:?} CNN: {:?}",
                    shape,
                    tensor_shape,
                );
            }
        };

        let (w, h): (u32, u32) = (w.try_into()?, h.try_into()?);
        Ok(Resolution::new(w, h))
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on the area of `image` covered by `rect`, returning the outputs.
    ///
    /// The area is sampled to create the network's input tensor. If its aspect ratio does not
    /// match the network's input aspect ratio, it will be stretched. Parts of `rect` outside of
    /// the image are treated as black.
    pub fn estimate(&self, image: &Image, rect: Rect) -> anyhow::Result<Outputs> {
        let (h, w) = (
            self.input_res.height() as usize,
            self.input_res.width() as usize,
        );
        let sample = |x: usize, y: usize| {
            let color = image.sample(rect, x as f32 / w as f32, y as f32 / h as f32);
            self.color_mapper.map(color)
        };
        let input: TractTensor = match self.shape {
            CnnInputShape::NCHW => {
                Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| sample(x, y)[c]).into()
            }
            CnnInputShape::NHWC => {
                Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| sample(x, y)[c]).into()
            }
        };

        let outputs = self.model.run(tvec![TValue::from_const(Arc::new(input))])?;
        let inner = outputs
            .iter()
            .map(|value| {
                let view = value.to_array_view::<f32>()?;
                Ok(Tensor::new(
                    view.shape().to_vec(),
                    view.iter().copied().collect(),
                ))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Outputs::from(inner))
    }
}

/// Maps sRGB colors to the value range a network expects.
#[derive(Clone)]
pub struct ColorMapper {
    target_range: RangeInclusive<f32>,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        assert!(target_range.end() > target_range.start());
        Self { target_range }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        let start = *self.target_range.start();
        let end = *self.target_range.end();

        let adjust_range = (end - start) / 255.0;
        let rgb = [color.r(), color.g(), color.b()];
        rgb.map(|col| col as f32 * adjust_range + start)
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, fixed at 1.
/// - `C` is the number of color channels, 3 for RGB inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

/// An output tensor, flattened in row-major order.
#[derive(Debug, Clone)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Creates a tensor from its shape and row-major elements.
    ///
    /// # Panics
    ///
    /// Panics if the number of elements does not match `shape`.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "tensor data does not match shape {:?}",
            shape
        );
        Self { shape, data }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
#[derive(Debug)]
pub struct Outputs {
    inner: Vec<Tensor>,
}

impl From<Vec<Tensor>> for Outputs {
    fn from(inner: Vec<Tensor>) -> Self {
        Self { inner }
    }
}

impl Outputs {
    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns the output tensor at `index`, or an error if the network produced fewer outputs.
    pub fn get(&self, index: usize) -> anyhow::Result<&Tensor> {
        self.inner.get(index).with_context(|| {
            format!(
                "network produced {} outputs, output {} requested",
                self.inner.len(),
                index
            )
        })
    }
}
