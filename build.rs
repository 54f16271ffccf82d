// Copyright 2024 The rust-summarization Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// The `summarize` and `convert-weights` binaries link against libtorch directly.
// CUDA kernels are only registered when libtorch is kept in the link line.
fn main() {
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if !matches!(target_os.as_str(), "linux" | "windows") {
        return;
    }
    if let Some(libtorch_dir) = std::env::var_os("DEP_TCH_LIBTORCH_LIB") {
        println!(
            "cargo:rustc-link-arg=-Wl,-rpath={}",
            libtorch_dir.to_string_lossy()
        );
    }
    for arg in ["-Wl,--no-as-needed", "-Wl,--copy-dt-needed-entries", "-ltorch"] {
        println!("cargo:rustc-link-arg={arg}");
    }
}
