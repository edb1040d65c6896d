mod cli;

use std::error::Error;
use std::path::Path;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::{SeedableRng, rngs::StdRng};

use vcdtomo::{
    config::vcd::{Config, read_config_file},
    io::raw,
    model::TomographyModel,
    utils::{group_digits, timing::Progress},
    vcd::Vcd,
};

use cli::{Cli, Command};

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();
    let args = Cli::parse();

    let mut progress = Progress::new();
    progress.start("Reading configuration");
    let config = read_config_file(&args.config)?;
    let params = config.projector_params()?;
    let execution = config.execution(args.threads)?;
    progress.done();
    info!("Sinogram {:?}, volume {:?}, {:?}", params.sinogram_shape, params.recon_shape, execution.placement);

    let model: TomographyModel = TomographyModel::new(params, config.angles(), execution)?
        .with_ror_mask(config.recon.use_ror_mask);

    match &args.command {
        Command::Forward { input, output } => {
            progress.start("Reading volume");
            let volume = raw::read_array3(input, params.recon_shape)?;
            progress.done();
            progress.start("Forward projecting");
            let sinogram = model.forward_project(volume.view())?;
            progress.done();
            write(&mut progress, sinogram.view(), output)?;
        }
        Command::Back { input, output } => {
            progress.start("Reading sinogram");
            let sinogram = raw::read_array3(input, params.sinogram_shape)?;
            progress.done();
            progress.start("Back projecting");
            let volume = model.back_project(sinogram.view())?;
            progress.done();
            write(&mut progress, volume.view(), output)?;
        }
        Command::Fbp { input, output } => {
            progress.start("Reading sinogram");
            let sinogram = raw::read_array3(input, params.sinogram_shape)?;
            progress.done();
            progress.start("Filtered back projection");
            let volume = model.fbp_recon(sinogram.view())?;
            progress.done();
            write(&mut progress, volume.view(), output)?;
        }
        Command::Recon { input, output, weights } => {
            progress.start("Reading sinogram");
            let sinogram = raw::read_array3(input, params.sinogram_shape)?;
            let weights = weights.as_ref()
                .map(|path| raw::read_array3(path, params.sinogram_shape))
                .transpose()?;
            progress.done();
            let recon = reconstruct(&config, &model, sinogram.view(), weights.as_ref().map(|w| w.view()))?;
            write(&mut progress, recon.view(), output)?;
        }
    }
    Ok(())
}

fn reconstruct(
    config  : &Config,
    model   : &TomographyModel,
    sinogram: ndarray::ArrayView3<f32>,
    weights : Option<ndarray::ArrayView3<f32>>,
) -> Result<ndarray::Array3<f32>, Box<dyn Error>> {
    let vcd_params = config.vcd_params();
    let mut rng = match config.recon.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None       => StdRng::from_entropy(),
    };
    let mut vcd = Vcd::new(model, sinogram, weights, None, &vcd_params, &mut rng)?;

    let bar = ProgressBar::new(vcd_params.max_iterations as u64);
    bar.set_style(ProgressStyle::default_bar()
                  .template("[{elapsed_precise}] {wide_bar} {pos}/{len} {msg}")?);
    bar.set_message(format!("cost {:.4e}", vcd.cost()));
    for stats in vcd.by_ref() {
        let stats = stats?;
        bar.set_message(format!("cost {:.4e} ({} subsets)", stats.cost, group_digits(stats.num_subsets)));
        bar.inc(1);
    }
    bar.finish();
    Ok(vcd.into_recon())
}

fn write(progress: &mut Progress, data: ndarray::ArrayView3<f32>, path: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    progress.start(&format!("Writing {}", path.display()));
    raw::write_array3(data, path)?;
    progress.done();
    Ok(())
}
