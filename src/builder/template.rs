//! The cross-toolchain stage template.
//!
//! Declares every step of a two-stage GCC bootstrap for a [`TargetSpec`]:
//!
//! 1. download and extract binutils, gcc, its prerequisites, the kernel and
//!    the C library sources
//! 2. build and install binutils
//! 3. create the build sysroot
//! 4. build the stage-1 compiler (`all-gcc`)
//! 5. install kernel and C library headers, then startup files
//! 6. build libgcc and the C library against the stage-1 compiler
//! 7. build the full stage-2 compiler
//!
//! Steps are declared in that order and [`PlanBuilder::finish`] sorts them, so
//! declaration order only breaks ties.

use crate::builder::context::BuildContext;
use crate::builder::ninja;
use crate::builder::plan::{BuildPlan, BuildStep, PlanBuilder, Stage, VariableGroup};
use crate::core::errors::ConfigError;
use crate::core::libc::LibC;
use crate::core::spec::TargetSpec;

const GNU_SITE: &str = "https://ftpmirror.gnu.org";
const ISL_SITE: &str = "https://libisl.sourceforge.io";
const MUSL_SITE: &str = "https://www.musl-libc.org";
const MINGW_W64_SITE: &str =
    "https://sourceforge.net/projects/mingw-w64/files/mingw-w64/mingw-w64-release";

/// Stage-1 compiler invocation used to build target runtime libraries.
const TARGET_CC: &str = "CC=\"${target}-gcc --sysroot=$build_sysroot_dir\"";

/// Generate the build plan for `spec`.
pub fn generate(spec: &TargetSpec, ctx: &BuildContext) -> Result<BuildPlan, ConfigError> {
    let mut t = Template {
        spec,
        ctx,
        plan: PlanBuilder::new(),
    };

    t.variables();
    t.fetch();
    t.binutils();
    t.sysroot();
    t.stage1_gcc();

    if spec.libc().requires_mingw_w64() {
        t.mingw_w64_headers();
        t.mingw_w64_crt();
        if spec.libc().is_mingw_w64() {
            t.mingw_w64_threads();
        }
    } else {
        if spec.linux_headers() {
            t.linux_headers();
        }
        t.configure_libc();
        t.libgcc();
        t.build_libc();
    }

    t.stage2_gcc();
    t.clean();
    t.install();
    t.defaults();

    let plan = t.plan.finish(spec.target().clone(), spec.libc())?;

    tracing::debug!(
        target = %plan.target,
        steps = plan.step_count(),
        rules = plan.rules.len(),
        "generated build plan"
    );

    Ok(plan)
}

struct Template<'a> {
    spec: &'a TargetSpec,
    ctx: &'a BuildContext,
    plan: PlanBuilder,
}

impl Template<'_> {
    /// Declare a console-pool step with a rule of the same name.
    fn console_step<I, S>(
        &mut self,
        name: &str,
        stage: Stage,
        deps: I,
        command: impl Into<String>,
        description: impl Into<String>,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plan.rule(name, command, description);
        self.plan.step(BuildStep::new(name, stage).deps(deps).console());
    }

    fn libc_name(&self) -> &'static str {
        self.spec.libc().name()
    }

    fn variables(&mut self) {
        let spec = self.spec;
        let ctx = self.ctx;

        let mut triples = VariableGroup::new().var("target", spec.target().as_str());
        if let Some(host) = spec.host() {
            triples = triples.var("host", host.as_str());
        }
        self.plan.variables(triples);

        let mut tools = VariableGroup::new()
            .var("cc", ninja::escape(&ctx.cc))
            .var("cxx", ninja::escape(&ctx.cxx));
        if spec.host().is_some() {
            tools = tools
                .var("cc_build", ninja::escape(&ctx.cc_build))
                .var("cxx_build", ninja::escape(&ctx.cxx_build));
        }
        tools = tools
            .var("cc_flags", ninja::escape(&spec.cc_flags().join(" ")))
            .var("cxx_flags", ninja::escape(&spec.cxx_flags().join(" ")))
            .var("ld_flags", ninja::escape(&spec.ld_flags().join(" ")));
        self.plan.variables(tools);

        let mut versions = VariableGroup::new();
        for package in spec.packages() {
            versions = versions.var(
                format!("{}_version", package.key()),
                spec.versions().get(package),
            );
        }
        self.plan.variables(versions);

        let mut sites = VariableGroup::new().var("gnu_site", GNU_SITE);
        if spec.gcc_with_isl() {
            sites = sites.var("isl_site", ISL_SITE);
        }
        if spec.linux_headers() {
            sites = sites.var("linux_site", spec.versions().linux_site());
        }
        match spec.libc() {
            LibC::Musl => sites = sites.var("musl_site", MUSL_SITE),
            libc if libc.requires_mingw_w64() => {
                sites = sites.var("mingw_w64_site", MINGW_W64_SITE)
            }
            _ => {}
        }
        self.plan.variables(sites);

        self.plan.variables(
            VariableGroup::new()
                .var("download_cmd", "curl -L -o")
                .var("make_cmd", ctx.make_cmd()),
        );

        self.plan.variables(
            VariableGroup::with_comment("edit below this line carefully")
                .var("root_dir", ninja::escape(&ctx.root_dir().to_string_lossy()))
                .var("build_dir", "build")
                .var("build_sysroot_dir", "$root_dir/$build_dir/sysroot")
                .var("build_targets_dir", "$build_dir/targets")
                .var("download_dir", "downloads")
                .var("install_dir", "$root_dir/toolchain"),
        );

        let mut env_vars = String::from(
            "$env_path CC=\"$cc\" CXX=\"$cxx\" CFLAGS=\"$cc_flags\" CXXFLAGS=\"$cxx_flags\" LDFLAGS=\"$ld_flags\"",
        );
        if spec.host().is_some() {
            env_vars.push_str(" CC_FOR_BUILD=\"$cc_build\" CXX_FOR_BUILD=\"$cxx_build\"");
        }
        self.plan.variables(
            VariableGroup::new()
                .var("env_path", "PATH=\"$install_dir/bin:$$PATH\"")
                .var("env_vars", env_vars),
        );

        let mut tarballs = VariableGroup::new();
        let mut dirs = VariableGroup::new();
        for package in spec.packages() {
            tarballs = tarballs.var(format!("{}_tarball", package.key()), package.tarball());
            dirs = dirs.var(format!("{}_dir", package.key()), package.source_dir());
        }
        self.plan.variables(tarballs);
        self.plan.variables(dirs);

        let mut build_dirs = VariableGroup::new()
            .var("binutils_build_dir", "$build_dir/binutils-build")
            .var("gcc_build_dir", "$build_dir/gcc-build");
        if spec.libc().requires_mingw_w64() {
            build_dirs = build_dirs
                .var("mingw_w64_headers_build_dir", "$build_dir/mingw-w64-headers-build")
                .var("mingw_w64_crt_build_dir", "$build_dir/mingw-w64-crt-build");
            if spec.libc().is_mingw_w64() {
                build_dirs = build_dirs
                    .var("mingw_w64_threads_build_dir", "$build_dir/mingw-w64-threads-build");
            }
        } else {
            let libc = self.libc_name();
            build_dirs = build_dirs.var(
                format!("{libc}_build_dir"),
                format!("$build_dir/{libc}-build"),
            );
        }
        if spec.linux_headers() {
            build_dirs = build_dirs
                .var("linux_build_dir", "$build_dir/linux-build")
                .var("arch", spec.target().linux_arch());
        }
        self.plan.variables(build_dirs);
    }

    fn fetch(&mut self) {
        let packages = self.spec.packages();

        self.plan
            .rule("download-tarball", "$download_cmd $out $url", "Downloading $url");
        self.plan.rule(
            "extract-tar",
            "rm -rf $extracted_dir && tar -C $build_dir -x -$compression -f $in && cd $extracted_dir && $patch_command && touch ../../$out",
            "Extracting $in",
        );

        for package in &packages {
            let key = package.key();
            self.plan.step(
                BuildStep::new(format!("download-{key}"), Stage::Fetch)
                    .rule("download-tarball")
                    .output(format!("${key}_tarball"))
                    .console()
                    .bind("url", package.url()),
            );
        }

        for &package in &packages {
            let key = package.key();
            self.plan.step(
                BuildStep::new(format!("extract-{key}"), Stage::Fetch)
                    .rule("extract-tar")
                    .dep(format!("download-{key}"))
                    .input(format!("${key}_tarball"))
                    .bind("compression", package.compression().tar_flag())
                    .bind("extracted_dir", format!("${key}_dir"))
                    .bind("patch_command", self.ctx.patches.patch_command(package)),
            );
        }
    }

    fn binutils(&mut self) {
        let flags = self.spec.binutils_flags().join(" ");

        self.console_step(
            "configure-binutils",
            Stage::Binutils,
            ["extract-binutils"],
            format!("rm -rf $binutils_build_dir && mkdir $binutils_build_dir && cd $binutils_build_dir && $env_vars ../binutils-$binutils_version/configure {flags} && touch ../../$out"),
            "Configuring binutils $binutils_version",
        );
        self.console_step(
            "build-binutils",
            Stage::Binutils,
            ["configure-binutils"],
            "cd $binutils_build_dir && $env_vars $make_cmd MAKE=\"$make_cmd\" && touch ../../$out",
            "Building binutils $binutils_version",
        );
        self.console_step(
            "install-binutils",
            Stage::Binutils,
            ["build-binutils"],
            "cd $binutils_build_dir && $env_vars $make_cmd install MAKE=\"$make_cmd\" DESTDIR=$install_dir && touch ../../$out",
            "Installing binutils $binutils_version",
        );
    }

    fn sysroot(&mut self) {
        // Every lib directory gcc, glibc or mingw-w64 might look in points at
        // the same place.
        const LINKS: [(&str, &str); 10] = [
            ("usr/lib", "usr/lib32"),
            ("usr/lib", "usr/lib64"),
            ("usr/include", "include"),
            ("usr/lib", "lib"),
            ("usr/lib", "lib32"),
            ("usr/lib", "lib64"),
            ("usr/include", "mingw/include"),
            ("usr/lib", "mingw/lib"),
            ("usr/lib", "mingw/lib32"),
            ("usr/lib", "mingw/lib64"),
        ];

        let mut command = String::from(
            "rm -rf $build_sysroot_dir && mkdir -p $build_sysroot_dir/usr/include $build_sysroot_dir/usr/lib $build_sysroot_dir/mingw",
        );
        for (src, dst) in LINKS {
            command.push_str(&format!(
                " && ln -sf $build_sysroot_dir/{src} $build_sysroot_dir/{dst}"
            ));
        }
        command.push_str(" && touch $out");

        self.plan.rule(
            "build-sysroot",
            command,
            "Creating build sysroot dir at $build_sysroot_dir",
        );
        self.plan.step(BuildStep::new("build-sysroot", Stage::Sysroot));
    }

    fn stage1_gcc(&mut self) {
        self.plan.rule(
            "move-directory",
            "rm -rf $dst_dir && mv $src_dir $dst_dir && touch $out",
            "Moving $src_dir -> $dst_dir",
        );

        let mut configure_deps = vec!["extract-gcc".to_string()];
        for package in self.spec.gcc_prerequisites() {
            let key = package.key();
            let name = format!("move-{key}");
            self.plan.step(
                BuildStep::new(&name, Stage::Stage1Compiler)
                    .rule("move-directory")
                    .deps([format!("extract-{key}"), "extract-gcc".to_string()])
                    .bind("src_dir", format!("${key}_dir"))
                    .bind("dst_dir", format!("$gcc_dir/{key}")),
            );
            configure_deps.push(name);
        }
        configure_deps.push("install-binutils".to_string());
        configure_deps.push("build-sysroot".to_string());

        let flags = self.spec.gcc_flags().join(" ");
        self.console_step(
            "configure-gcc",
            Stage::Stage1Compiler,
            configure_deps,
            format!("rm -rf $gcc_build_dir && mkdir $gcc_build_dir && cd $gcc_build_dir && $env_vars ../gcc-$gcc_version/configure {flags} && touch ../../$out"),
            "Configuring gcc $gcc_version",
        );

        let mut all_gcc_deps = vec!["configure-gcc"];
        if self.spec.libc().is_mingw_w64() {
            all_gcc_deps.push("install-mingw-w64-headers-sysroot");
        }
        self.console_step(
            "build-gcc-all-gcc",
            Stage::Stage1Compiler,
            all_gcc_deps,
            "cd $gcc_build_dir && $env_vars $make_cmd all-gcc MAKE=\"$make_cmd\" && touch ../../$out",
            "Building gcc $gcc_version (all-gcc)",
        );
        self.console_step(
            "install-gcc-all-gcc",
            Stage::Stage1Compiler,
            ["build-gcc-all-gcc"],
            "cd $gcc_build_dir && $env_vars $make_cmd install-gcc DESTDIR=$install_dir MAKE=\"$make_cmd\" && touch ../../$out",
            "Installing gcc $gcc_version (all-gcc)",
        );
    }

    /// `--with-default-msvcrt` and friends shared by headers and crt.
    fn mingw_w64_runtime_flags(&self) -> Vec<String> {
        match self.spec.libc() {
            LibC::NewlibCygwin => vec![
                "--enable-w32api".to_string(),
                "--with-default-msvcrt=ucrt".to_string(),
            ],
            libc => vec![format!("--with-default-msvcrt={}", libc.name())],
        }
    }

    fn mingw_w64_headers(&mut self) {
        let mut flags = vec!["--prefix=".to_string(), "--host=$target".to_string()];
        flags.extend(self.mingw_w64_runtime_flags());
        let flags = flags.join(" ");

        self.console_step(
            "configure-mingw-w64-headers",
            Stage::LibcHeaders,
            ["extract-mingw_w64"],
            format!("rm -rf $mingw_w64_headers_build_dir && mkdir $mingw_w64_headers_build_dir && cd $mingw_w64_headers_build_dir && $env_vars ../mingw-w64-v$mingw_w64_version/mingw-w64-headers/configure {flags} && touch ../../$out"),
            "Configuring mingw-w64 $mingw_w64_version (headers)",
        );
        self.console_step(
            "install-mingw-w64-headers-sysroot",
            Stage::LibcHeaders,
            ["configure-mingw-w64-headers", "build-sysroot"],
            "cd $mingw_w64_headers_build_dir && $env_vars $make_cmd install DESTDIR=$build_sysroot_dir/usr && touch ../../$out",
            "Installing mingw-w64 $mingw_w64_version (headers) at $build_sysroot_dir/usr",
        );
        self.console_step(
            "install-mingw-w64-headers",
            Stage::LibcHeaders,
            ["configure-mingw-w64-headers"],
            "cd $mingw_w64_headers_build_dir && $env_vars $make_cmd install DESTDIR=$install_dir/$target && touch ../../$out",
            "Installing mingw-w64 $mingw_w64_version (headers)",
        );
    }

    fn mingw_w64_crt(&mut self) {
        let mut flags = vec![
            "--prefix=".to_string(),
            "--host=$target".to_string(),
            "--with-sysroot=$build_sysroot_dir".to_string(),
        ];
        flags.extend(self.mingw_w64_runtime_flags());

        let target = self.spec.target();
        if target.arch() == "x86_64" {
            flags.extend(["--enable-lib64".to_string(), "--disable-lib32".to_string()]);
        } else if target.is_i86() {
            flags.extend(["--enable-lib32".to_string(), "--disable-lib64".to_string()]);
        }
        let flags = flags.join(" ");

        self.console_step(
            "configure-mingw-w64-crt",
            Stage::LibcStartup,
            ["install-gcc-all-gcc", "install-mingw-w64-headers-sysroot"],
            format!("rm -rf $mingw_w64_crt_build_dir && mkdir $mingw_w64_crt_build_dir && cd $mingw_w64_crt_build_dir && $env_path {TARGET_CC} ../mingw-w64-v$mingw_w64_version/mingw-w64-crt/configure {flags} && touch ../../$out"),
            "Configuring mingw-w64 $mingw_w64_version (crt)",
        );
        self.console_step(
            "build-mingw-w64-crt",
            Stage::LibcStartup,
            ["configure-mingw-w64-crt"],
            format!("cd $mingw_w64_crt_build_dir && $env_path {TARGET_CC} $make_cmd MAKE=\"$make_cmd\" && touch ../../$out"),
            "Building mingw-w64 $mingw_w64_version (crt)",
        );
        self.console_step(
            "install-mingw-w64-crt-sysroot",
            Stage::LibcStartup,
            ["build-mingw-w64-crt"],
            format!("cd $mingw_w64_crt_build_dir && $env_path {TARGET_CC} $make_cmd install DESTDIR=$build_sysroot_dir/usr MAKE=\"$make_cmd\" && touch ../../$out"),
            "Installing mingw-w64 $mingw_w64_version (crt) at $build_sysroot_dir/usr",
        );
        self.console_step(
            "install-mingw-w64-crt",
            Stage::LibcStartup,
            ["build-mingw-w64-crt"],
            format!("cd $mingw_w64_crt_build_dir && $env_path {TARGET_CC} $make_cmd install DESTDIR=$install_dir/$target MAKE=\"$make_cmd\" && touch ../../$out"),
            "Installing mingw-w64 $mingw_w64_version",
        );
    }

    fn mingw_w64_threads(&mut self) {
        let flags = "--prefix= --host=$target --with-sysroot=$build_sysroot_dir";

        self.console_step(
            "configure-mingw-w64-threads",
            Stage::Libc,
            ["install-mingw-w64-crt-sysroot"],
            format!("rm -rf $mingw_w64_threads_build_dir && mkdir $mingw_w64_threads_build_dir && cd $mingw_w64_threads_build_dir && $env_path {TARGET_CC} ../mingw-w64-v$mingw_w64_version/mingw-w64-libraries/winpthreads/configure {flags} && touch ../../$out"),
            "Configuring mingw-w64 $mingw_w64_version (winpthreads)",
        );
        self.console_step(
            "build-mingw-w64-threads",
            Stage::Libc,
            ["configure-mingw-w64-threads"],
            format!("cd $mingw_w64_threads_build_dir && $env_path {TARGET_CC} $make_cmd MAKE=\"$make_cmd\" RC=\"${{target}}-windres -I$build_sysroot_dir/usr/include\" && touch ../../$out"),
            "Building mingw-w64 $mingw_w64_version (winpthreads)",
        );
        self.console_step(
            "install-mingw-w64-threads-sysroot",
            Stage::Libc,
            ["build-mingw-w64-threads"],
            format!("cd $mingw_w64_threads_build_dir && $env_path {TARGET_CC} $make_cmd install DESTDIR=$build_sysroot_dir/usr MAKE=\"$make_cmd\" && touch ../../$out"),
            "Installing mingw-w64 $mingw_w64_version (winpthreads) at $build_sysroot_dir/usr",
        );
        self.console_step(
            "install-mingw-w64-threads",
            Stage::Libc,
            ["build-mingw-w64-threads"],
            format!("cd $mingw_w64_threads_build_dir && $env_path {TARGET_CC} $make_cmd install DESTDIR=$install_dir/$target MAKE=\"$make_cmd\" && touch ../../$out"),
            "Installing mingw-w64 $mingw_w64_version (winpthreads)",
        );
    }

    fn linux_headers(&mut self) {
        self.console_step(
            "build-linux-headers",
            Stage::KernelHeaders,
            ["extract-linux"],
            "cd $linux_dir && $env_vars $make_cmd ARCH=$arch mrproper && touch ../../$out",
            "Building linux $linux_version (headers)",
        );
        self.console_step(
            "install-linux-headers-sysroot",
            Stage::KernelHeaders,
            ["build-linux-headers", "build-sysroot"],
            "rm -rf $linux_build_dir && mkdir $linux_build_dir && cd $linux_dir && $env_vars $make_cmd O=$root_dir/$linux_build_dir ARCH=$arch INSTALL_HDR_PATH=$build_sysroot_dir/usr headers_install && touch ../../$out",
            "Installing linux $linux_version (headers) at $build_sysroot_dir/usr",
        );
        self.console_step(
            "install-linux-headers",
            Stage::KernelHeaders,
            ["build-linux-headers"],
            "rm -rf $linux_build_dir && mkdir $linux_build_dir && cd $linux_dir && $env_vars $make_cmd O=$root_dir/$linux_build_dir ARCH=$arch INSTALL_HDR_PATH=$install_dir/$target headers_install && touch ../../$out",
            "Installing linux $linux_version (headers)",
        );
    }

    fn configure_libc(&mut self) {
        let libc = self.libc_name();

        let mut deps = vec![format!("extract-{libc}"), "install-gcc-all-gcc".to_string()];
        if self.spec.linux_headers() {
            deps.push("install-linux-headers-sysroot".to_string());
        }

        let mut env = vec!["CROSS_COMPILE=${target}-".to_string(), TARGET_CC.to_string()];
        let mut flags = vec!["--prefix=".to_string(), "--host=$target".to_string()];
        match self.spec.libc() {
            LibC::Glibc => flags.extend([
                "--disable-multilib".to_string(),
                "--disable-werror".to_string(),
                "--with-headers=$build_sysroot_dir/usr/include".to_string(),
            ]),
            // musl links libgcc statically from the stage-1 build tree.
            LibC::Musl => env.push(
                "LIBCC=\"$root_dir/$gcc_build_dir/$target/libgcc/libgcc.a\"".to_string(),
            ),
            _ => {}
        }
        let env = env.join(" ");
        let flags = flags.join(" ");

        self.console_step(
            &format!("configure-{libc}"),
            Stage::LibcHeaders,
            deps,
            format!("rm -rf ${libc}_build_dir && mkdir ${libc}_build_dir && cd ${libc}_build_dir && $env_path {env} ../{libc}-${libc}_version/configure {flags} && touch ../../$out"),
            format!("Configuring {libc} ${libc}_version"),
        );
        self.console_step(
            &format!("install-{libc}-headers-sysroot"),
            Stage::LibcHeaders,
            [format!("configure-{libc}"), "build-sysroot".to_string()],
            format!("cd ${libc}_build_dir && $env_path $make_cmd install-headers DESTDIR=$build_sysroot_dir/usr && touch ../../$out"),
            format!("Installing {libc} ${libc}_version (headers) at $build_sysroot_dir/usr"),
        );
    }

    fn libgcc(&mut self) {
        let libc = self.libc_name();
        let mut deps = vec![format!("install-{libc}-headers-sysroot")];
        let mut sub_make = "MAKE=\"$make_cmd\"";

        match self.spec.libc() {
            LibC::Glibc => {
                self.console_step(
                    "build-glibc-csu",
                    Stage::LibcStartup,
                    ["install-glibc-headers-sysroot"],
                    "cd $glibc_build_dir && $env_path $make_cmd csu/subdir_lib && touch ../../$out",
                    "Building glibc $glibc_version (csu)",
                );
                // libgcc links against a libc.so; an empty stub is enough until
                // the real one is built.
                self.console_step(
                    "install-glibc-csu-sysroot",
                    Stage::LibcStartup,
                    ["build-glibc-csu"],
                    "install $glibc_build_dir/csu/crti.o $glibc_build_dir/csu/crtn.o $build_sysroot_dir/usr/lib && $env_path ${target}-gcc -nostdlib -nostartfiles -shared -x c /dev/null -o $build_sysroot_dir/usr/lib/libc.so && touch $build_sysroot_dir/usr/include/gnu/stubs.h && touch $out",
                    "Installing glibc $glibc_version (csu) at $build_sysroot_dir/usr",
                );
                deps.push("install-glibc-csu-sysroot".to_string());
            }
            LibC::Musl => sub_make = "MAKE=\"$make_cmd enable_shared=no\"",
            _ => {}
        }

        self.console_step(
            "build-gcc-all-target-libgcc",
            Stage::Libgcc,
            deps,
            format!("cd $gcc_build_dir && $env_vars $make_cmd all-target-libgcc {sub_make} && touch ../../$out"),
            "Building gcc $gcc_version (all-target-libgcc)",
        );
        self.console_step(
            "install-gcc-all-target-libgcc",
            Stage::Libgcc,
            ["build-gcc-all-target-libgcc"],
            format!("cd $gcc_build_dir && $env_vars $make_cmd install-target-libgcc DESTDIR=$install_dir {sub_make} && touch ../../$out"),
            "Installing gcc $gcc_version (all-target-libgcc)",
        );
    }

    fn build_libc(&mut self) {
        let libc = self.libc_name();

        // glibc needs libgcc installed, musl only built.
        let dep = match self.spec.libc() {
            LibC::Glibc => "install-gcc-all-target-libgcc",
            _ => "build-gcc-all-target-libgcc",
        };

        self.console_step(
            &format!("build-{libc}"),
            Stage::Libc,
            [dep],
            format!("cd ${libc}_build_dir && $env_path $make_cmd MAKE=\"$make_cmd\" && touch ../../$out"),
            format!("Building {libc} ${libc}_version"),
        );
        self.console_step(
            &format!("install-{libc}-sysroot"),
            Stage::Libc,
            [format!("build-{libc}"), "build-sysroot".to_string()],
            format!("cd ${libc}_build_dir && $env_path $make_cmd install DESTDIR=$build_sysroot_dir/usr MAKE=\"$make_cmd\" && touch ../../$out"),
            format!("Installing {libc} ${libc}_version at $build_sysroot_dir"),
        );
        self.console_step(
            &format!("install-{libc}"),
            Stage::Libc,
            [format!("build-{libc}")],
            format!("cd ${libc}_build_dir && $env_path $make_cmd install DESTDIR=$install_dir/$target MAKE=\"$make_cmd\" && touch ../../$out"),
            format!("Installing {libc} ${libc}_version"),
        );
    }

    fn stage2_gcc(&mut self) {
        let libc = self.spec.libc();
        let mut deps = Vec::new();
        if libc.requires_mingw_w64() {
            deps.push("install-mingw-w64-crt-sysroot".to_string());
            if libc.is_mingw_w64() {
                deps.push("install-mingw-w64-threads-sysroot".to_string());
            }
        } else {
            deps.push(format!("install-{}-sysroot", libc.name()));
        }

        self.console_step(
            "build-gcc",
            Stage::Stage2Compiler,
            deps,
            "cd $gcc_build_dir && $env_vars $make_cmd MAKE=\"$make_cmd\" && touch ../../$out",
            "Building gcc $gcc_version",
        );
        self.console_step(
            "install-gcc",
            Stage::Stage2Compiler,
            ["build-gcc"],
            "cd $gcc_build_dir && $env_vars $make_cmd install MAKE=\"$make_cmd\" DESTDIR=$install_dir && touch ../../$out",
            "Installing gcc $gcc_version",
        );
    }

    fn clean(&mut self) {
        self.plan.rule("delete-directory", "rm -rf $dir", "Deleting $dir");
        self.plan.rule("clean-all", "true", "Cleaned everything");

        for (name, dir) in [
            ("clean-build", "$build_dir"),
            ("clean-downloads", "$download_dir"),
            ("clean-toolchain", "$install_dir"),
        ] {
            self.plan.step(
                BuildStep::new(name, Stage::Clean)
                    .rule("delete-directory")
                    .output(name)
                    .bind("dir", dir),
            );
        }

        self.plan.step(
            BuildStep::new("clean", Stage::Clean)
                .rule("clean-all")
                .output("clean")
                .deps(["clean-build", "clean-downloads", "clean-toolchain"]),
        );
    }

    fn install(&mut self) {
        let libc = self.spec.libc();
        let mut deps = vec!["install-binutils".to_string(), "install-gcc".to_string()];

        if libc.requires_mingw_w64() {
            deps.push("install-mingw-w64-headers".to_string());
            deps.push("install-mingw-w64-crt".to_string());
            if libc.is_mingw_w64() {
                deps.push("install-mingw-w64-threads".to_string());
            }
        } else {
            if self.spec.linux_headers() {
                deps.push("install-linux-headers".to_string());
            }
            deps.push(format!("install-{}", libc.name()));
        }

        self.plan
            .rule("install-all", "true", "Installed toolchain at $install_dir");
        self.plan.step(
            BuildStep::new("install", Stage::Install)
                .rule("install-all")
                .output("install")
                .deps(deps),
        );
    }

    fn defaults(&mut self) {
        self.plan.add_default("build-gcc");
        if self.spec.linux_headers() {
            self.plan.add_default("build-linux-headers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::libc::LinuxHeaders;
    use crate::core::package::Package;
    use crate::core::spec::{split_flags, SpecOptions};

    fn plan_for(opts: SpecOptions) -> BuildPlan {
        let spec = TargetSpec::new(&opts).unwrap();
        generate(&spec, &BuildContext::new("/work")).unwrap()
    }

    fn plan(target: &str) -> BuildPlan {
        plan_for(SpecOptions::new(target))
    }

    fn before(plan: &BuildPlan, first: &str, second: &str) -> bool {
        match (plan.position(first), plan.position(second)) {
            (Some(a), Some(b)) => a < b,
            _ => panic!("missing step `{first}` or `{second}`"),
        }
    }

    fn variable<'p>(plan: &'p BuildPlan, name: &str) -> Option<&'p str> {
        plan.variables
            .iter()
            .flat_map(|g| g.variables.iter())
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }

    #[test]
    fn test_static_musl_headers_before_stage2() {
        let mut opts = SpecOptions::new("x86_64-linux-musl");
        opts.cc_flags = split_flags("-static -Os");
        opts.cxx_flags = split_flags("-static -Os");
        opts.ld_flags = split_flags("-static");
        let plan = plan_for(opts);

        assert!(before(&plan, "install-musl-headers-sysroot", "build-gcc"));
        assert!(before(&plan, "install-musl-headers-sysroot", "build-gcc-all-target-libgcc"));
        assert_eq!(variable(&plan, "cc_flags"), Some("-static -Os"));
        assert_eq!(variable(&plan, "ld_flags"), Some("-static"));
    }

    #[test]
    fn test_plans_are_topologically_ordered() {
        let triples = [
            "x86_64-linux-musl",
            "aarch64-linux-gnu",
            "arm-linux-musleabihf",
            "mips64el-linux-musln32",
            "riscv64-linux-gnu",
            "x86_64-w64-mingw32",
            "i686-w64-mingw32",
            "x86_64-pc-cygwin",
        ];

        for triple in triples {
            for isl in [false, true] {
                let mut opts = SpecOptions::new(triple);
                opts.gcc_with_isl = isl;
                let plan = plan_for(opts);
                assert!(plan.is_topologically_ordered(), "{triple} isl={isl}");
            }
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = plan("aarch64-linux-gnu");
        let b = plan("aarch64-linux-gnu");
        assert_eq!(a, b);
    }

    #[test]
    fn test_stage_order_for_musl() {
        let plan = plan("x86_64-linux-musl");

        assert!(before(&plan, "download-binutils", "extract-binutils"));
        assert!(before(&plan, "install-binutils", "configure-gcc"));
        assert!(before(&plan, "move-gmp", "configure-gcc"));
        assert!(before(&plan, "install-linux-headers-sysroot", "configure-musl"));
        assert!(before(&plan, "install-gcc-all-gcc", "configure-musl"));
        assert!(before(&plan, "build-gcc-all-target-libgcc", "build-musl"));
        assert!(before(&plan, "install-musl-sysroot", "build-gcc"));
        assert!(plan.step("build-glibc-csu").is_none());
    }

    #[test]
    fn test_glibc_startup_files() {
        let plan = plan("aarch64-linux-gnu");

        assert!(before(&plan, "install-glibc-headers-sysroot", "build-glibc-csu"));
        assert!(before(&plan, "install-glibc-csu-sysroot", "build-gcc-all-target-libgcc"));
        assert!(before(&plan, "install-gcc-all-target-libgcc", "build-glibc"));
        assert_eq!(variable(&plan, "arch"), Some("arm64"));
    }

    #[test]
    fn test_mingw_headers_before_all_gcc() {
        let plan = plan("x86_64-w64-mingw32");

        assert!(before(&plan, "install-mingw-w64-headers-sysroot", "build-gcc-all-gcc"));
        assert!(before(&plan, "install-mingw-w64-threads-sysroot", "build-gcc"));
        assert!(plan.step("build-linux-headers").is_none());
        assert_eq!(plan.defaults, vec!["build-gcc"]);

        let crt = plan.rule("configure-mingw-w64-crt").unwrap();
        assert!(crt.command.contains("--with-default-msvcrt=ucrt"));
        assert!(crt.command.contains("--enable-lib64 --disable-lib32"));
    }

    #[test]
    fn test_cygwin_has_no_winpthreads() {
        let plan = plan("x86_64-pc-cygwin");

        assert!(plan.step("configure-mingw-w64-threads").is_none());
        assert!(plan.step("install-mingw-w64-crt").is_some());
        let headers = plan.rule("configure-mingw-w64-headers").unwrap();
        assert!(headers.command.contains("--enable-w32api"));
    }

    #[test]
    fn test_isl_moved_into_gcc_tree() {
        let mut opts = SpecOptions::new("x86_64-linux-musl");
        opts.gcc_with_isl = true;
        let plan = plan_for(opts);

        let step = plan.step("move-isl").unwrap();
        assert_eq!(step.deps, vec!["extract-isl", "extract-gcc"]);
        assert_eq!(step.bindings["dst_dir"], "$gcc_dir/isl");
        assert!(plan.step("configure-gcc").unwrap().deps.contains(&"move-isl".to_string()));

        assert!(self::plan("x86_64-linux-musl").step("move-isl").is_none());
    }

    #[test]
    fn test_musl_without_kernel_headers() {
        let mut opts = SpecOptions::new("x86_64-linux-musl");
        opts.linux_headers = LinuxHeaders::Disabled;
        let plan = plan_for(opts);

        assert!(plan.step("download-linux").is_none());
        assert!(!plan
            .step("configure-musl")
            .unwrap()
            .deps
            .contains(&"install-linux-headers-sysroot".to_string()));
        assert_eq!(plan.defaults, vec!["build-gcc"]);
        assert!(!plan.step("install").unwrap().deps.contains(&"install-linux-headers".to_string()));
    }

    #[test]
    fn test_defaults_and_install() {
        let plan = plan("x86_64-linux-musl");

        assert_eq!(plan.defaults, vec!["build-gcc", "build-linux-headers"]);
        assert_eq!(
            plan.step("install").unwrap().deps,
            vec!["install-binutils", "install-gcc", "install-linux-headers", "install-musl"]
        );
        assert_eq!(plan.steps.last().map(|s| s.name.as_str()), Some("install"));
    }

    #[test]
    fn test_extract_uses_patches_and_compression() {
        let spec = TargetSpec::new(&SpecOptions::new("x86_64-linux-musl")).unwrap();
        let mut ctx = BuildContext::new("/work");
        ctx.patches.add(Package::Musl, "patches/musl-1.2.4/0001-fix.diff");
        let plan = generate(&spec, &ctx).unwrap();

        let musl = plan.step("extract-musl").unwrap();
        assert_eq!(musl.bindings["compression"], "z");
        assert_eq!(
            musl.bindings["patch_command"],
            "patch -p 1 -i ../../patches/musl-1.2.4/0001-fix.diff"
        );
        assert_eq!(plan.step("extract-gcc").unwrap().bindings["patch_command"], "true");
    }

    #[test]
    fn test_host_adds_build_compilers() {
        let mut opts = SpecOptions::new("aarch64-linux-musl");
        opts.host = Some("x86_64-w64-mingw32".to_string());
        let plan = plan_for(opts);

        assert_eq!(variable(&plan, "host"), Some("x86_64-w64-mingw32"));
        assert_eq!(variable(&plan, "cc_build"), Some("gcc"));
        assert!(variable(&plan, "env_vars").unwrap().contains("CC_FOR_BUILD"));

        let native = plan_for(SpecOptions::new("aarch64-linux-musl"));
        assert_eq!(variable(&native, "host"), None);
        assert!(!variable(&native, "env_vars").unwrap().contains("CC_FOR_BUILD"));
    }

    #[test]
    fn test_root_dir_is_escaped() {
        let spec = TargetSpec::new(&SpecOptions::new("x86_64-linux-musl")).unwrap();
        let plan = generate(&spec, &BuildContext::new("/tmp/a$b")).unwrap();
        assert_eq!(variable(&plan, "root_dir"), Some("/tmp/a$$b"));
    }

    #[test]
    fn test_user_flags_are_escaped() {
        let mut opts = SpecOptions::new("x86_64-linux-musl");
        opts.ld_flags = split_flags("-Wl,-rpath,$ORIGIN -Wl,-z,origin$");
        opts.gcc_flags = split_flags("--with-pkgversion=$USER");
        let spec = TargetSpec::new(&opts).unwrap();

        let mut ctx = BuildContext::new("/work");
        ctx.cc = "/opt/$cc/bin/gcc".to_string();
        let plan = generate(&spec, &ctx).unwrap();

        assert_eq!(
            variable(&plan, "ld_flags"),
            Some("-Wl,-rpath,$$ORIGIN -Wl,-z,origin$$")
        );
        assert_eq!(variable(&plan, "cc"), Some("/opt/$$cc/bin/gcc"));

        let configure = plan.rule("configure-gcc").unwrap();
        assert!(configure.command.contains("--target=$target"));
        assert!(configure.command.contains("--with-pkgversion=$$USER"));
    }
}
