fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.env");

    // WIFI_SSID, WIFI_PASSWORD and OTA_HOST may come from a .env file
    dotenv_build::output(dotenv_build::Config::default()).unwrap();

    let version = chrono::Utc::now().format("%Y.%m.%d-%H%M");
    println!("cargo:rustc-env=BUILD_VERSION={version}");

    println!("cargo:rustc-link-arg=-Tlinkall.x");
}
