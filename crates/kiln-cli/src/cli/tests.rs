#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Command, ModeArg};
    use clap::Parser;
    use kiln_config::BuildMode;
    use std::path::PathBuf;

    #[test]
    fn build_flags_parse() {
        let cli = Cli::try_parse_from(["kiln", "build", "--gzip", "--report", "--cwd", "app"]).unwrap();
        match cli.command {
            Command::Build(args) => {
                assert!(args.gzip);
                assert!(args.report);
                assert_eq!(args.cwd, Some(PathBuf::from("app")));
            }
            other => panic!("expected build, got {other:?}"),
        }
    }

    #[test]
    fn dev_overrides_parse() {
        let cli = Cli::try_parse_from(["kiln", "dev", "-p", "3000", "--host", "0.0.0.0", "--open"]).unwrap();
        match cli.command {
            Command::Dev(args) => {
                assert_eq!(args.port, Some(3000));
                assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
                assert!(args.open);
            }
            other => panic!("expected dev, got {other:?}"),
        }
    }

    #[test]
    fn inspect_mode_maps_to_build_mode() {
        let cli = Cli::try_parse_from(["kiln", "inspect", "--mode", "production"]).unwrap();
        match cli.command {
            Command::Inspect(args) => {
                assert_eq!(args.mode, Some(ModeArg::Production));
                assert_eq!(BuildMode::from(ModeArg::Production), BuildMode::Production);
            }
            other => panic!("expected inspect, got {other:?}"),
        }
    }

    #[test]
    fn global_flags_work_after_the_subcommand() {
        let cli = Cli::try_parse_from(["kiln", "build", "--verbose", "--no-color"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.no_color);
    }

    #[test]
    fn verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["kiln", "-v", "-q", "build"]).is_err());
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(Cli::try_parse_from(["kiln", "dev", "--port", "70000"]).is_err());
    }
}
