fn main() {
    lexmacro::cli::run();
}
