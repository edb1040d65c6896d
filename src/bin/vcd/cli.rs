/// Command line interface for `vcd` executable
#[derive(clap::Parser, Debug, Clone)]
#[clap(
    name = "vcd",
    about = "Parallel-beam tomographic projection and VCD reconstruction",
)]
pub (super) struct Cli {
    /// TOML file describing geometry, reconstruction and batching
    #[clap(short, long)]
    pub config: PathBuf,

    /// Size of the thread pool (overrides the configuration file)
    #[clap(short = 'j', long)]
    pub threads: Option<usize>,

    #[clap(subcommand)]
    pub (super) command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub (super) enum Command {

    /// Project a raw volume `[rows, cols, slices]` into a sinogram
    Forward {
        #[clap(short, long)]
        input: PathBuf,

        #[clap(short, long)]
        output: PathBuf,
    },

    /// Back project a raw sinogram `[views, rows, channels]` into a volume
    Back {
        #[clap(short, long)]
        input: PathBuf,

        #[clap(short, long)]
        output: PathBuf,
    },

    /// Reconstruct a volume from a raw sinogram by filtered back projection
    Fbp {
        #[clap(short, long)]
        input: PathBuf,

        #[clap(short, long)]
        output: PathBuf,
    },

    /// Reconstruct a volume from a raw sinogram by VCD
    Recon {
        #[clap(short, long)]
        input: PathBuf,

        #[clap(short, long)]
        output: PathBuf,

        /// Raw sinogram weights; all ones if absent
        #[clap(short, long)]
        weights: Option<PathBuf>,
    },
}

use std::path::PathBuf;

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_recon() {
        let cli = Cli::parse_from(["vcd", "-c", "vcd-config.toml", "-j", "3",
                                   "recon", "-i", "sino.raw", "-o", "recon.raw", "-w", "w.raw"]);
        assert_eq!(cli.threads, Some(3));
        match cli.command {
            Command::Recon { input, output, weights } => {
                assert_eq!(input, PathBuf::from("sino.raw"));
                assert_eq!(output, PathBuf::from("recon.raw"));
                assert_eq!(weights, Some(PathBuf::from("w.raw")));
            }
            other => panic!("wrong subcommand: {other:?}"),
        }
    }

    #[test]
    fn parse_fbp() {
        let cli = Cli::parse_from(["vcd", "--config", "vcd-config.toml", "fbp", "--input", "s.raw", "--output", "r.raw"]);
        assert_eq!(cli.threads, None);
        assert!(matches!(cli.command, Command::Fbp { .. }));
        assert!(Cli::try_parse_from(["vcd", "-c", "c.toml", "fbp", "-i", "s.raw", "-w", "w.raw"]).is_err());
    }

    #[test]
    fn config_is_required() {
        assert!(Cli::try_parse_from(["vcd", "forward", "-i", "a", "-o", "b"]).is_err());
    }
}
