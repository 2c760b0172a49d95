use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// AlexNet adapted to small (CIFAR-sized) inputs.
///
/// features:   conv(3→c1, k3, s2) → pool → relu
///             conv(c1→c2, k3)    → pool → relu
///             conv(c2→c3, k3) → relu
///             conv(c3→c4, k3) → relu
///             conv(c4→c5, k3) → pool → relu
/// classifier: dropout → fc(c5·s·s → hidden) → relu
///             dropout → fc(hidden → hidden) → relu
///             fc(hidden → num_classes)
///
/// The stride-2 stem and three 2x2 pools shrink the input by 16,
/// so `image_size` must be a multiple of 16 (s = image_size / 16).
// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize;
// deriving them again gives conflicting impls.
#[derive(Config, Debug)]
pub struct AlexNetConfig {
    pub num_classes: usize,
    #[config(default = "32")]
    pub image_size: usize,
    #[config(default = "3")]
    pub in_channels: usize,
    #[config(default = "[64, 192, 384, 256, 256]")]
    pub channels: [usize; 5],
    #[config(default = "4096")]
    pub hidden: usize,
    #[config(default = "0.5")]
    pub dropout: f64,
}

impl AlexNetConfig {
    /// Spatial side length after the feature extractor
    pub fn feature_size(&self) -> usize {
        self.image_size / 16
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> AlexNet<B> {
        let [c1, c2, c3, c4, c5] = self.channels;
        let conv = |i: usize, o: usize, stride: usize| {
            Conv2dConfig::new([i, o], [3, 3])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init::<B>(device)
        };
        let flat = c5 * self.feature_size() * self.feature_size();

        AlexNet {
            conv1:   conv(self.in_channels, c1, 2),
            conv2:   conv(c1, c2, 1),
            conv3:   conv(c2, c3, 1),
            conv4:   conv(c3, c4, 1),
            conv5:   conv(c4, c5, 1),
            pool:    MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            relu:    Relu::new(),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc1:     LinearConfig::new(flat, self.hidden).init(device),
            fc2:     LinearConfig::new(self.hidden, self.hidden).init(device),
            fc3:     LinearConfig::new(self.hidden, self.num_classes).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct AlexNet<B: Backend> {
    pub conv1:   Conv2d<B>,
    pub conv2:   Conv2d<B>,
    pub conv3:   Conv2d<B>,
    pub conv4:   Conv2d<B>,
    pub conv5:   Conv2d<B>,
    pub pool:    MaxPool2d,
    pub relu:    Relu,
    pub dropout: Dropout,
    pub fc1:     Linear<B>,
    pub fc2:     Linear<B>,
    pub fc3:     Linear<B>,
}

impl<B: Backend> AlexNet<B> {
    /// images: [batch, channels, height, width] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.relu.forward(self.pool.forward(self.conv1.forward(images)));
        let x = self.relu.forward(self.pool.forward(self.conv2.forward(x)));
        let x = self.relu.forward(self.conv3.forward(x));
        let x = self.relu.forward(self.conv4.forward(x));
        let x = self.relu.forward(self.pool.forward(self.conv5.forward(x)));

        // [batch, c5, s, s] → [batch, c5*s*s]
        let x = x.flatten::<2>(1, 3);

        let x = self.relu.forward(self.fc1.forward(self.dropout.forward(x)));
        let x = self.relu.forward(self.fc2.forward(self.dropout.forward(x)));
        self.fc3.forward(x)
    }
}
