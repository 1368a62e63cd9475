use burn::prelude::*;
use burn::{
    module::AutodiffModule,
    optim::{self, Optimizer, SimpleOptimizer, adaptor::OptimizerAdaptor},
    tensor::backend::AutodiffBackend,
};

/// Maps an optimizer config to the optimizer it builds, so that saved optimizer
/// state can be loaded into a freshly initialized one.
pub trait OptimConfigExt<AutoB, AutoM>
where
    Self: Config,
    AutoB: AutodiffBackend,
    AutoM: AutodiffModule<AutoB>,
{
    type Optim: SimpleOptimizer<AutoB::InnerBackend>;
    type Adaptor: Optimizer<AutoM, AutoB>;
    fn init(&self) -> Self::Adaptor;
}

impl<AutoB, AutoM> OptimConfigExt<AutoB, AutoM> for optim::AdamConfig
where
    Self: Config,
    AutoB: AutodiffBackend,
    AutoM: AutodiffModule<AutoB>,
{
    type Optim = burn::optim::Adam;
    type Adaptor = OptimizerAdaptor<Self::Optim, AutoM, AutoB>;
    fn init(&self) -> Self::Adaptor {
        optim::AdamConfig::init::<AutoB, AutoM>(self)
    }
}
